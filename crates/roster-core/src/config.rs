//! Roster Configuration Management
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then environment variables. The result is validated once at startup and
//! handed to constructors as a read-only value.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Longest token lifetime accepted, ten years
pub const MAX_EXPIRY_HOURS: u64 = 24 * 365 * 10;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Relational store settings
    pub database: DatabaseConfig,

    /// Token signing settings
    pub jwt: JwtSettings,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Debug exposes internal error detail to clients, release hides it
    pub mode: RunMode,

    /// Message language when the client sends no usable `Accept-Language`
    pub language: Language,
}

impl AppConfig {
    /// Startup entry point: optional file, environment overrides, validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_env_override()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables on top of defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with process environment variables (env takes precedence)
    pub fn with_env_override(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Every recognised key replaces the current value; values that fail to
    /// parse are reported rather than skipped.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(host) = lookup("ROSTER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("ROSTER_PORT") {
            self.server.port = parse_value("ROSTER_PORT", port)?;
        }
        if let Some(secs) = lookup("ROSTER_READ_TIMEOUT_SECS") {
            self.server.read_timeout_secs = parse_value("ROSTER_READ_TIMEOUT_SECS", secs)?;
        }
        if let Some(secs) = lookup("ROSTER_WRITE_TIMEOUT_SECS") {
            self.server.write_timeout_secs = parse_value("ROSTER_WRITE_TIMEOUT_SECS", secs)?;
        }
        if let Some(origins) = lookup("ROSTER_CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Database
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(max) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_value("DATABASE_MAX_CONNECTIONS", max)?;
        }
        if let Some(secs) = lookup("DATABASE_QUERY_TIMEOUT_SECS") {
            self.database.query_timeout_secs = parse_value("DATABASE_QUERY_TIMEOUT_SECS", secs)?;
        }

        // JWT
        if let Some(secret) = lookup("JWT_SECRET") {
            self.jwt.secret_key = secret;
        }
        if let Some(hours) = lookup("JWT_EXPIRY_HOURS") {
            self.jwt.access_expiry_hours = parse_value("JWT_EXPIRY_HOURS", hours)?;
        }
        if let Some(hours) = lookup("JWT_REFRESH_EXPIRY_HOURS") {
            self.jwt.refresh_expiry_hours = parse_value("JWT_REFRESH_EXPIRY_HOURS", hours)?;
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("LOG_JSON") {
            self.logging.json_format = parse_value("LOG_JSON", json)?;
        }

        if let Some(mode) = lookup("ROSTER_MODE") {
            self.mode = mode.parse()?;
        }
        if let Some(language) = lookup("ROSTER_LANGUAGE") {
            self.language = language.parse()?;
        }

        Ok(self)
    }

    /// Reject configurations the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                key: "server.port".to_string(),
                value: "0".to_string(),
            });
        }
        if self.jwt.secret_key.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.secret_key".to_string()));
        }
        if self.jwt.access_expiry_hours == 0 {
            return Err(ConfigError::InvalidValue {
                key: "jwt.access_expiry_hours".to_string(),
                value: "0".to_string(),
            });
        }
        for (key, hours) in [
            ("jwt.access_expiry_hours", self.jwt.access_expiry_hours),
            ("jwt.refresh_expiry_hours", self.jwt.refresh_expiry_hours),
        ] {
            if hours > MAX_EXPIRY_HOURS {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: hours.to_string(),
                });
            }
        }
        if self.jwt.refresh_expiry_hours < self.jwt.access_expiry_hours {
            return Err(ConfigError::InvalidValue {
                key: "jwt.refresh_expiry_hours".to_string(),
                value: self.jwt.refresh_expiry_hours.to_string(),
            });
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                key: "database.max_connections".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// `host:port` string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_value<T: FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum time to wait for a request to be read, in seconds
    pub read_timeout_secs: u64,

    /// Maximum time to produce a response, in seconds
    pub write_timeout_secs: u64,

    /// Allowed origins for CORS; `*` allows any origin
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            read_timeout_secs: 5,
            write_timeout_secs: 5,
            cors_origins: vec!["*".to_string()],
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL
    pub url: String,

    /// Connection pool size
    pub max_connections: u32,

    /// Upper bound for a single repository call, in seconds
    pub query_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/app.db?mode=rwc".to_string(),
            max_connections: 5,
            query_timeout_secs: 5,
        }
    }
}

/// Token signing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtSettings {
    /// Shared HMAC secret
    pub secret_key: String,

    /// Access token lifetime in hours
    pub access_expiry_hours: u64,

    /// Refresh token lifetime in hours
    pub refresh_expiry_hours: u64,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            // Development only; override with JWT_SECRET
            secret_key: "roster-development-secret-change-me".to_string(),
            access_expiry_hours: 24,
            refresh_expiry_hours: 24 * 7,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Server run mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Debug,
    #[default]
    Release,
}

impl RunMode {
    pub fn is_debug(self) -> bool {
        matches!(self, Self::Debug)
    }
}

impl FromStr for RunMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "release" => Ok(Self::Release),
            _ => Err(ConfigError::InvalidValue {
                key: "ROSTER_MODE".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Language of client-facing envelope messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Zh => "zh",
        }
    }

    /// Match a tag such as `zh-CN` or `en_US` by its primary subtag
    pub fn from_tag(tag: &str) -> Option<Self> {
        let primary = tag.trim().split(['-', '_']).next()?.to_ascii_lowercase();
        match primary.as_str() {
            "en" => Some(Self::En),
            "zh" => Some(Self::Zh),
            _ => None,
        }
    }
}

impl FromStr for Language {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| ConfigError::InvalidValue {
            key: "ROSTER_LANGUAGE".to_string(),
            value: s.to_string(),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.read_timeout_secs, 5);
        assert_eq!(config.jwt.access_expiry_hours, 24);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.mode, RunMode::Release);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::default()
            .apply_overrides(lookup(&[
                ("ROSTER_PORT", "9090"),
                ("DATABASE_URL", "sqlite::memory:"),
                ("JWT_SECRET", "s3cret"),
                ("JWT_EXPIRY_HOURS", "2"),
                ("ROSTER_CORS_ORIGINS", "http://a.test, http://b.test,"),
                ("ROSTER_MODE", "debug"),
                ("LOG_JSON", "true"),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.jwt.secret_key, "s3cret");
        assert_eq!(config.jwt.access_expiry_hours, 2);
        assert_eq!(
            config.server.cors_origins,
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert!(config.mode.is_debug());
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_unparseable_env_value_is_reported() {
        let err = AppConfig::default()
            .apply_overrides(lookup(&[("ROSTER_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "ROSTER_PORT"));
    }

    #[test]
    fn test_validate_rejects_empty_secret() {
        let mut config = AppConfig::default();
        config.jwt.secret_key = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_validate_rejects_short_refresh_expiry() {
        let mut config = AppConfig::default();
        config.jwt.access_expiry_hours = 48;
        config.jwt.refresh_expiry_hours = 24;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_expiry_hours() {
        let mut config = AppConfig::default();
        config.jwt.access_expiry_hours = MAX_EXPIRY_HOURS;
        config.jwt.refresh_expiry_hours = MAX_EXPIRY_HOURS;
        assert!(config.validate().is_ok());

        config.jwt.refresh_expiry_hours = u64::MAX;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "jwt.refresh_expiry_hours"
        ));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            mode = "debug"

            [server]
            port = 3000

            [jwt]
            secret_key = "from-file"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.jwt.secret_key, "from-file");
        assert_eq!(config.jwt.refresh_expiry_hours, 168);
        assert_eq!(config.database.max_connections, 5);
        assert!(config.mode.is_debug());
    }

    #[test]
    fn test_language_from_env_and_tags() {
        let config = AppConfig::default()
            .apply_overrides(lookup(&[("ROSTER_LANGUAGE", "zh")]))
            .unwrap();
        assert_eq!(config.language, Language::Zh);
        assert_eq!(AppConfig::default().language, Language::En);

        assert_eq!(Language::from_tag("zh-CN"), Some(Language::Zh));
        assert_eq!(Language::from_tag("EN_us"), Some(Language::En));
        assert_eq!(Language::from_tag("fr"), None);
        assert!("klingon".parse::<Language>().is_err());
    }

    #[test]
    fn test_run_mode_parse() {
        assert_eq!("Debug".parse::<RunMode>().unwrap(), RunMode::Debug);
        assert_eq!("release".parse::<RunMode>().unwrap(), RunMode::Release);
        assert!("verbose".parse::<RunMode>().is_err());
    }
}
