//! User service layer
//!
//! Business rules between the handlers and the repository: email
//! uniqueness, credential hashing, partial-update merging, login and token
//! issuance. Repository failures are re-classified into [`AppError`] here,
//! so handlers never see raw storage errors.

use async_trait::async_trait;
use roster_core::{NewUser, Role, StoreError, User, UserRepository};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth::jwt::TokenService;
use crate::auth::password::CredentialHasher;
use crate::error::AppError;
use crate::models::{
    CreateUserRequest, LoginRequest, LoginResponse, RefreshResponse, RegisterRequest,
    UpdateUserRequest, UserResponse,
};

const INVALID_CREDENTIALS: &str = "invalid email or password";
const TOKEN_TYPE: &str = "Bearer";
const DECOY_PASSWORD: &str = "roster-login-decoy";

/// User management capability consumed by the HTTP handlers
#[async_trait]
pub trait UserService: Send + Sync {
    /// Create a user; the role defaults to `user`
    async fn create_user(&self, req: CreateUserRequest) -> Result<User, AppError>;

    /// Self-registration; always creates a `user` role account
    async fn register(&self, req: RegisterRequest) -> Result<User, AppError>;

    async fn get_user_by_id(&self, id: i64) -> Result<User, AppError>;

    /// The authenticated caller's own record
    async fn current_user(&self, id: i64) -> Result<User, AppError>;

    async fn get_user_by_email(&self, email: &str) -> Result<User, AppError>;

    /// All users, newest first
    async fn get_all_users(&self) -> Result<Vec<User>, AppError>;

    /// Merge the supplied fields into user `id`
    async fn update_user(&self, id: i64, req: UpdateUserRequest) -> Result<User, AppError>;

    async fn delete_user(&self, id: i64) -> Result<(), AppError>;

    /// Verify credentials and issue an access/refresh token pair
    async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AppError>;

    /// Exchange a refresh token for a new access token
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, AppError>;
}

/// Production [`UserService`]
pub struct UserManager {
    repository: Arc<dyn UserRepository>,
    hasher: CredentialHasher,
    tokens: TokenService,
    /// Verified against on unknown emails so both login failures cost one
    /// Argon2 run
    decoy_hash: Option<String>,
}

impl UserManager {
    pub fn new(
        repository: Arc<dyn UserRepository>,
        hasher: CredentialHasher,
        tokens: TokenService,
    ) -> Self {
        let decoy_hash = match hasher.hash(DECOY_PASSWORD) {
            Ok(hash) => Some(hash),
            Err(e) => {
                warn!(error = %e, "Could not prepare login decoy hash");
                None
            }
        };

        Self {
            repository,
            hasher,
            tokens,
            decoy_hash,
        }
    }

    /// Argon2 is CPU-bound; keep it off the async workers
    async fn hash_password(&self, password: String) -> Result<String, AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::internal(format!("hashing task failed: {e}")))?
            .map_err(AppError::from)
    }

    async fn verify_password(&self, hash: String, password: String) -> Result<bool, AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&hash, &password))
            .await
            .map_err(|e| AppError::internal(format!("verification task failed: {e}")))
    }

    /// Fail if `email` belongs to an existing user.
    ///
    /// Only a courtesy check: the unique constraint in the store is what
    /// actually guarantees uniqueness under concurrent inserts.
    async fn ensure_email_available(&self, email: &str) -> Result<(), AppError> {
        match self.repository.find_by_email(email).await {
            Ok(_) => Err(AppError::Conflict("email already in use".to_string())),
            Err(StoreError::NotFound) => Ok(()),
            Err(e) => Err(AppError::storage("check email", e)),
        }
    }

    fn expires_in(&self) -> u64 {
        self.tokens.access_ttl().as_secs()
    }
}

fn ensure_valid_id(id: i64) -> Result<(), AppError> {
    if id <= 0 {
        return Err(AppError::bad_request("invalid user id"));
    }
    Ok(())
}

#[async_trait]
impl UserService for UserManager {
    async fn create_user(&self, req: CreateUserRequest) -> Result<User, AppError> {
        self.ensure_email_available(&req.email).await?;

        let password_hash = self.hash_password(req.password).await?;
        let user = self
            .repository
            .create(NewUser {
                name: req.name,
                email: req.email,
                password_hash,
                age: req.age,
                role: req.role.unwrap_or_default(),
            })
            .await
            .map_err(|e| AppError::storage("create user", e))?;

        info!(user_id = user.id, role = %user.role, "User created");
        Ok(user)
    }

    async fn register(&self, req: RegisterRequest) -> Result<User, AppError> {
        self.create_user(CreateUserRequest {
            role: Some(Role::User),
            ..CreateUserRequest::from(req)
        })
        .await
    }

    async fn get_user_by_id(&self, id: i64) -> Result<User, AppError> {
        ensure_valid_id(id)?;
        self.repository
            .find_by_id(id)
            .await
            .map_err(|e| AppError::storage("find user", e))
    }

    async fn current_user(&self, id: i64) -> Result<User, AppError> {
        // A token can outlive its account
        self.get_user_by_id(id).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, AppError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AppError::bad_request("email is required"));
        }
        self.repository
            .find_by_email(email)
            .await
            .map_err(|e| AppError::storage("find user by email", e))
    }

    async fn get_all_users(&self) -> Result<Vec<User>, AppError> {
        self.repository
            .find_all()
            .await
            .map_err(|e| AppError::storage("list users", e))
    }

    async fn update_user(&self, id: i64, req: UpdateUserRequest) -> Result<User, AppError> {
        let mut user = self.get_user_by_id(id).await?;

        if let Some(name) = req.name {
            user.name = name;
        }
        if let Some(email) = req.email {
            if email != user.email {
                self.ensure_email_available(&email).await?;
                user.email = email;
            }
        }
        if let Some(age) = req.age {
            user.age = age;
        }
        if let Some(password) = req.password {
            user.password_hash = self.hash_password(password).await?;
        }
        if let Some(role) = req.role {
            user.role = role;
        }

        let updated = self
            .repository
            .update(id, &user)
            .await
            .map_err(|e| AppError::storage("update user", e))?;

        debug!(user_id = id, "User updated");
        Ok(updated)
    }

    async fn delete_user(&self, id: i64) -> Result<(), AppError> {
        self.get_user_by_id(id).await?;
        self.repository
            .delete(id)
            .await
            .map_err(|e| AppError::storage("delete user", e))?;

        info!(user_id = id, "User deleted");
        Ok(())
    }

    async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AppError> {
        // Unknown email and wrong password must be indistinguishable
        let user = match self.repository.find_by_email(&req.email).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                if let Some(decoy) = self.decoy_hash.clone() {
                    let _ = self.verify_password(decoy, req.password).await;
                }
                return Err(AppError::unauthorized(INVALID_CREDENTIALS));
            }
            Err(e) => return Err(AppError::storage("login", e)),
        };

        if !self
            .verify_password(user.password_hash.clone(), req.password)
            .await?
        {
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        }

        let access_token =
            self.tokens
                .issue_access_token(user.id, &user.email, &user.name, user.role)?;
        let refresh_token = self.tokens.issue_refresh_token(
            user.id,
            &user.email,
            &user.name,
            user.role,
            self.tokens.refresh_ttl(),
        )?;

        Ok(LoginResponse {
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: self.expires_in(),
            user: UserResponse::from(user),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, AppError> {
        let claims = self
            .tokens
            .validate_refresh_token(refresh_token)
            .map_err(|e| {
                debug!(error = %e, "Refresh token rejected");
                AppError::unauthorized("invalid or expired refresh token")
            })?;

        // Re-read so a deleted user cannot mint tokens and role changes apply
        let user = match self.repository.find_by_id(claims.user_id).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                return Err(AppError::unauthorized("invalid or expired refresh token"))
            }
            Err(e) => return Err(AppError::storage("refresh token", e)),
        };

        let access_token =
            self.tokens
                .issue_access_token(user.id, &user.email, &user.name, user.role)?;

        Ok(RefreshResponse {
            access_token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: self.expires_in(),
        })
    }
}

/// Create the first admin account if the store holds no users yet.
///
/// Returns the created admin, or `None` when users already exist.
pub async fn bootstrap_admin(
    repository: &dyn UserRepository,
    service: &dyn UserService,
    req: CreateUserRequest,
) -> Result<Option<User>, AppError> {
    let existing = repository
        .count()
        .await
        .map_err(|e| AppError::storage("count users", e))?;
    if existing > 0 {
        return Ok(None);
    }

    let admin = service
        .create_user(CreateUserRequest {
            role: Some(Role::Admin),
            ..req
        })
        .await?;
    Ok(Some(admin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenType;
    use crate::auth::password::PasswordConfig;
    use roster_core::MemoryUserRepository;
    use std::time::Duration;

    fn tokens() -> TokenService {
        TokenService::new("service-test", Duration::from_secs(3600), Duration::from_secs(7200))
    }

    fn manager() -> (UserManager, Arc<MemoryUserRepository>) {
        let repository = Arc::new(MemoryUserRepository::new());
        let manager = UserManager::new(
            repository.clone(),
            CredentialHasher::new(PasswordConfig::testing()),
            tokens(),
        );
        (manager, repository)
    }

    fn create_req(email: &str) -> CreateUserRequest {
        CreateUserRequest {
            name: "Alice".to_string(),
            email: email.to_string(),
            password: "secret1".to_string(),
            age: 30,
            role: None,
        }
    }

    #[tokio::test]
    async fn test_create_hashes_password_and_defaults_role() {
        let (service, _) = manager();
        let user = service.create_user(create_req("a@x.com")).await.unwrap();

        assert_ne!(user.password_hash, "secret1");
        assert!(user.password_hash.starts_with("$argon2id$"));
        assert_eq!(user.role, Role::User);
    }

    #[tokio::test]
    async fn test_register_forces_user_role_and_current_user_reads_store() {
        let (service, _) = manager();
        let user = service
            .register(RegisterRequest {
                name: "Zhang".to_string(),
                email: "zhang@x.com".to_string(),
                password: "secret1".to_string(),
                age: 25,
            })
            .await
            .unwrap();
        assert_eq!(user.role, Role::User);

        assert_eq!(service.current_user(user.id).await.unwrap(), user);

        service.delete_user(user.id).await.unwrap();
        assert!(matches!(
            service.current_user(user.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected_and_existing_intact() {
        let (service, _) = manager();
        let first = service.create_user(create_req("a@x.com")).await.unwrap();

        let err = service.create_user(create_req("a@x.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let fetched = service.get_user_by_id(first.id).await.unwrap();
        assert_eq!(fetched, first);
    }

    #[tokio::test]
    async fn test_partial_update_merge() {
        let (service, _) = manager();
        let user = service.create_user(create_req("a@x.com")).await.unwrap();

        let updated = service
            .update_user(
                user.id,
                UpdateUserRequest {
                    age: Some(31),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, user.name);
        assert_eq!(updated.email, "a@x.com");
        assert_eq!(updated.age, 31);
        assert_eq!(updated.password_hash, user.password_hash);
    }

    #[tokio::test]
    async fn test_update_email_to_taken_is_conflict() {
        let (service, _) = manager();
        service.create_user(create_req("a@x.com")).await.unwrap();
        let b = service.create_user(create_req("b@x.com")).await.unwrap();

        let err = service
            .update_user(
                b.id,
                UpdateUserRequest {
                    email: Some("a@x.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_same_email_is_allowed() {
        let (service, _) = manager();
        let a = service.create_user(create_req("a@x.com")).await.unwrap();
        let updated = service
            .update_user(
                a.id,
                UpdateUserRequest {
                    email: Some("a@x.com".to_string()),
                    age: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.age, 0);
    }

    #[tokio::test]
    async fn test_invalid_id_and_missing_user() {
        let (service, _) = manager();
        assert!(matches!(
            service.get_user_by_id(0).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            service.get_user_by_id(99).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.delete_user(99).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.update_user(99, UpdateUserRequest::default()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.get_user_by_email("  ").await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_login_does_not_distinguish_failures() {
        let (service, _) = manager();
        service.create_user(create_req("a@x.com")).await.unwrap();

        let unknown = service
            .login(LoginRequest {
                email: "nobody@x.com".to_string(),
                password: "secret1".to_string(),
            })
            .await
            .unwrap_err();
        let wrong = service
            .login(LoginRequest {
                email: "a@x.com".to_string(),
                password: "wrong-password".to_string(),
            })
            .await
            .unwrap_err();

        assert_eq!(unknown.to_string(), INVALID_CREDENTIALS);
        assert_eq!(wrong.to_string(), INVALID_CREDENTIALS);
        assert!(matches!(unknown, AppError::Unauthorized(_)));
        assert!(matches!(wrong, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_login_unknown_email_pays_for_a_hash() {
        let repository = Arc::new(MemoryUserRepository::new());
        let service = UserManager::new(
            repository,
            CredentialHasher::new(PasswordConfig {
                memory_cost: 4096,
                time_cost: 3,
                parallelism: 1,
                output_len: Some(32),
            }),
            tokens(),
        );
        service.create_user(create_req("a@x.com")).await.unwrap();

        let attempt = |email: &str| LoginRequest {
            email: email.to_string(),
            password: "wrong-password".to_string(),
        };

        let mut unknown = Duration::ZERO;
        let mut wrong = Duration::ZERO;
        for _ in 0..3 {
            let started = std::time::Instant::now();
            service.login(attempt("nobody@x.com")).await.unwrap_err();
            unknown += started.elapsed();

            let started = std::time::Instant::now();
            service.login(attempt("a@x.com")).await.unwrap_err();
            wrong += started.elapsed();
        }

        // Skipping the hash would make the unknown path orders of magnitude faster
        assert!(
            unknown * 4 >= wrong,
            "unknown email took {unknown:?}, wrong password took {wrong:?}"
        );
    }

    #[tokio::test]
    async fn test_login_issues_token_pair() {
        let (service, _) = manager();
        let user = service.create_user(create_req("a@x.com")).await.unwrap();

        let response = service
            .login(LoginRequest {
                email: "a@x.com".to_string(),
                password: "secret1".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 3600);
        assert_eq!(response.user.id, user.id);

        let tokens = tokens();
        let access = tokens.validate_access_token(&response.access_token).unwrap();
        assert_eq!(access.user_id, user.id);
        let refresh = tokens.validate_refresh_token(&response.refresh_token).unwrap();
        assert_eq!(refresh.token_type, TokenType::Refresh);
    }

    #[tokio::test]
    async fn test_refresh_flow() {
        let (service, repository) = manager();
        let user = service.create_user(create_req("a@x.com")).await.unwrap();
        let login = service
            .login(LoginRequest {
                email: "a@x.com".to_string(),
                password: "secret1".to_string(),
            })
            .await
            .unwrap();

        let refreshed = service.refresh(&login.refresh_token).await.unwrap();
        assert!(tokens().validate_access_token(&refreshed.access_token).is_ok());

        // Access tokens cannot be used as refresh tokens
        assert!(matches!(
            service.refresh(&login.access_token).await,
            Err(AppError::Unauthorized(_))
        ));

        // Deleted users cannot refresh
        repository.delete(user.id).await.unwrap();
        assert!(matches!(
            service.refresh(&login.refresh_token).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_bootstrap_admin_only_on_empty_store() {
        let (service, repository) = manager();

        let admin = bootstrap_admin(repository.as_ref(), &service, create_req("root@x.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, Role::Admin);

        let again = bootstrap_admin(repository.as_ref(), &service, create_req("other@x.com"))
            .await
            .unwrap();
        assert!(again.is_none());
    }
}
