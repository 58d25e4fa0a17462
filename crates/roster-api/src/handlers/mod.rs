//! API request handlers
//!
//! Author: hephaex@gmail.com

pub mod auth;
pub mod health;
pub mod users;

use crate::error::AppError;

/// Fallback for unmatched routes
pub async fn not_found_handler() -> AppError {
    AppError::not_found("resource")
}
