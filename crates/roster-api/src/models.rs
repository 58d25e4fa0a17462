//! Request and response payloads
//!
//! Request types carry declarative `validator` constraints; handlers reject
//! anything that fails them before the service is called.
//!
//! Author: hephaex@gmail.com

use chrono::{DateTime, Utc};
use roster_core::{Role, User};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// Public self-registration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 50, message = "name must be 2-50 characters"))]
    pub name: String,

    #[validate(email(message = "invalid email format"))]
    pub email: String,

    #[validate(length(min = 6, max = 128, message = "password must be 6-128 characters"))]
    pub password: String,

    #[validate(range(min = 0, max = 150, message = "age must be between 0 and 150"))]
    #[serde(default)]
    pub age: i32,
}

/// Administrative user creation; may assign a role
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 2, max = 50, message = "name must be 2-50 characters"))]
    pub name: String,

    #[validate(email(message = "invalid email format"))]
    pub email: String,

    #[validate(length(min = 6, max = 128, message = "password must be 6-128 characters"))]
    pub password: String,

    #[validate(range(min = 0, max = 150, message = "age must be between 0 and 150"))]
    #[serde(default)]
    pub age: i32,

    /// Defaults to `user`
    #[serde(default)]
    pub role: Option<Role>,
}

impl From<RegisterRequest> for CreateUserRequest {
    fn from(req: RegisterRequest) -> Self {
        Self {
            name: req.name,
            email: req.email,
            password: req.password,
            age: req.age,
            role: None,
        }
    }
}

/// Partial update: absent fields keep their stored value.
///
/// Empty strings are read as absent, so `{"name": "", "age": 31}` only
/// changes the age. An explicit `age: 0` is a real value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 2, max = 50, message = "name must be 2-50 characters"))]
    #[serde(default, deserialize_with = "empty_as_none")]
    pub name: Option<String>,

    #[validate(email(message = "invalid email format"))]
    #[serde(default, deserialize_with = "empty_as_none")]
    pub email: Option<String>,

    #[validate(length(min = 6, max = 128, message = "password must be 6-128 characters"))]
    #[serde(default, deserialize_with = "empty_as_none")]
    pub password: Option<String>,

    #[validate(range(min = 0, max = 150, message = "age must be between 0 and 150"))]
    #[serde(default)]
    pub age: Option<i32>,

    /// Only honored for admins
    #[serde(default)]
    pub role: Option<Role>,
}

impl UpdateUserRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.password.is_none()
            && self.age.is_none()
            && self.role.is_none()
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "refresh_token is required"))]
    pub refresh_token: String,
}

/// User as returned by the API; never includes the password hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub age: i32,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            age: user.age,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Successful login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub id: i64,
    pub deleted: bool,
}
