//! Application state management
//!
//! Everything request handlers need is wired here once at startup and
//! shared read-only behind an `Arc`.
//!
//! Author: hephaex@gmail.com

use roster_core::{AppConfig, SqlUserRepository, StoreError, UserRepository};
use std::sync::Arc;
use std::time::Instant;

use crate::auth::jwt::TokenService;
use crate::auth::password::CredentialHasher;
use crate::service::{UserManager, UserService};

/// Application state shared across handlers and middleware
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Token issuance/validation, built from `config.jwt`
    pub tokens: TokenService,
    /// User business rules
    pub users: Arc<dyn UserService>,
    /// Direct store access for health checks
    pub repository: Arc<dyn UserRepository>,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Wire the production service over `repository`
    pub fn new(config: AppConfig, repository: Arc<dyn UserRepository>) -> Self {
        Self::with_hasher(config, repository, CredentialHasher::default())
    }

    pub fn with_hasher(
        config: AppConfig,
        repository: Arc<dyn UserRepository>,
        hasher: CredentialHasher,
    ) -> Self {
        let tokens = TokenService::from_settings(&config.jwt);
        let users: Arc<dyn UserService> = Arc::new(UserManager::new(
            repository.clone(),
            hasher,
            tokens.clone(),
        ));
        Self::with_service(config, repository, users)
    }

    /// Use a caller supplied service, e.g. a test double
    pub fn with_service(
        config: AppConfig,
        repository: Arc<dyn UserRepository>,
        users: Arc<dyn UserService>,
    ) -> Self {
        Self {
            tokens: TokenService::from_settings(&config.jwt),
            config,
            users,
            repository,
            start_time: Instant::now(),
        }
    }

    /// Open the configured database, ensure the schema and wire the state
    pub async fn connect(config: AppConfig) -> Result<Self, StoreError> {
        let store = SqlUserRepository::connect(&config.database).await?;
        store.init_schema().await?;
        Ok(Self::new(config, Arc::new(store)))
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::MemoryUserRepository;

    #[test]
    fn test_state_tokens_follow_config() {
        let mut config = AppConfig::default();
        config.jwt.access_expiry_hours = 2;
        let state = AppState::new(config, Arc::new(MemoryUserRepository::new()));

        assert_eq!(state.tokens.access_ttl().as_secs(), 7200);
        assert_eq!(state.uptime_secs(), 0);
    }

    #[tokio::test]
    async fn test_connect_in_memory() {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:".to_string();

        let state = AppState::connect(config).await.unwrap();
        assert!(state.repository.ping().await.is_ok());
        assert_eq!(state.repository.count().await.unwrap(), 0);
    }
}
