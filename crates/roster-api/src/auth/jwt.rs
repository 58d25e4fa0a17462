//! JWT token issuance and validation
//!
//! Tokens are HMAC-SHA256 signed and stateless: any process holding the
//! shared secret can validate them, and they stay valid until expiry.
//! Validation is pinned to HS256 so tokens declaring another algorithm
//! (including `none`) are rejected before their signature is considered.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use roster_core::{JwtSettings, Role};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Distinguishes short-lived access tokens from refresh tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Session claims embedded in every token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub token_type: TokenType,
    /// Unique token identifier
    pub jti: String,
    /// Issued at (Unix seconds)
    pub iat: u64,
    /// Not valid before (Unix seconds)
    pub nbf: u64,
    /// Expiry (Unix seconds)
    pub exp: u64,
}

/// Token issuance and validation errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token")]
    Invalid,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Token is not yet valid")]
    NotYetValid,

    #[error("Expected a {expected:?} token")]
    WrongType { expected: TokenType },

    #[error("System time error: {0}")]
    SystemTime(#[from] std::time::SystemTimeError),
}

/// Issues and validates signed session tokens.
///
/// Built once at startup from [`JwtSettings`] and shared read-only.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

fn hours(count: u64) -> Duration {
    Duration::from_secs(count.saturating_mul(3600))
}

impl TokenService {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_settings(settings: &JwtSettings) -> Self {
        Self::new(
            &settings.secret_key,
            hours(settings.access_expiry_hours),
            hours(settings.refresh_expiry_hours),
        )
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Issue an access token valid from now for the configured lifetime
    pub fn issue_access_token(
        &self,
        user_id: i64,
        email: &str,
        name: &str,
        role: Role,
    ) -> Result<String, TokenError> {
        self.issue(user_id, email, name, role, TokenType::Access, self.access_ttl)
    }

    /// Issue a refresh token with its own, usually longer, lifetime
    pub fn issue_refresh_token(
        &self,
        user_id: i64,
        email: &str,
        name: &str,
        role: Role,
        expiry: Duration,
    ) -> Result<String, TokenError> {
        self.issue(user_id, email, name, role, TokenType::Refresh, expiry)
    }

    fn issue(
        &self,
        user_id: i64,
        email: &str,
        name: &str,
        role: Role,
        token_type: TokenType,
        expiry: Duration,
    ) -> Result<String, TokenError> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

        let claims = Claims {
            user_id,
            email: email.to_string(),
            name: name.to_string(),
            role,
            token_type,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            nbf: now,
            exp: now.saturating_add(expiry.as_secs().max(1)),
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// Verify algorithm, signature and the `nbf <= now <= exp` window
    pub fn parse_and_validate(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "iat"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::ImmatureSignature => TokenError::NotYetValid,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Invalid,
            },
        )?;

        Ok(token_data.claims)
    }

    /// Validate a token that must be an access token
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_typed(token, TokenType::Access)
    }

    /// Validate a token that must be a refresh token
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_typed(token, TokenType::Refresh)
    }

    fn validate_typed(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let claims = self.parse_and_validate(token)?;
        if claims.token_type != expected {
            return Err(TokenError::WrongType { expected });
        }
        Ok(claims)
    }
}
