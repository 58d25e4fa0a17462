//! Authentication and authorization module
//!
//! - Token issuance and validation (HS256 JWT, access + refresh)
//! - Password hashing with Argon2id
//! - Middleware for request authentication and role checks

pub mod jwt;
pub mod middleware;
pub mod password;

pub use jwt::{Claims, TokenError, TokenService, TokenType};
pub use middleware::{auth_middleware, require_role, AuthError, CurrentUser};
pub use password::{CredentialHasher, PasswordConfig, PasswordError};
