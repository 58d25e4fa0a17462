//! Roster Core - Domain models, storage traits, and shared types
//!
//! This crate defines the core abstractions used throughout Roster:
//! - Role model and permission table
//! - User records and creation payloads
//! - Storage error taxonomy
//! - The `UserRepository` capability trait and its SQLite implementation
//! - Configuration management

pub mod config;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod repository;

pub use config::{
    AppConfig, ConfigError, DatabaseConfig, JwtSettings, Language, LoggingConfig, RunMode,
    ServerConfig,
};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryUserRepository;
pub use repository::{SqlUserRepository, UserRepository};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::Infallible;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Failures surfaced by a [`UserRepository`]
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,

    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("storage operation timed out")]
    Timeout,

    #[error("storage error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ============================================================================
// Roles and Permissions
// ============================================================================

/// User role
///
/// Closed set of roles. `Admin` implies every permission; `User` may only
/// perform read-class operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Parse a role name, falling back to the least privileged role for
    /// anything unrecognised.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Check the fixed permission table
    pub fn has_permission(&self, permission: Permission) -> bool {
        match self {
            Role::Admin => true,
            Role::User => matches!(permission, Permission::Read),
        }
    }

    /// Whether this role satisfies a route requiring `required`
    pub fn satisfies(&self, required: Role) -> bool {
        self.is_admin() || *self == required
    }
}

impl FromStr for Role {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Role::parse(s))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Role::parse(&raw))
    }
}

/// Operation classes checked against [`Role::has_permission`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
    Delete,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Delete => "delete",
        }
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "read" => Ok(Permission::Read),
            "write" => Ok(Permission::Write),
            "delete" => Ok(Permission::Delete),
            other => Err(format!("unknown permission: {other}")),
        }
    }
}

// ============================================================================
// Users
// ============================================================================

/// Stored user record
///
/// `password_hash` is never serialized; API layers should still convert to a
/// dedicated response type before returning a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub age: i32,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for inserting a user; the store assigns id and timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub age: i32,
    pub role: Role,
}
