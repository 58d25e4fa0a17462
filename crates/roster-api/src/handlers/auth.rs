//! Authentication handlers
//!
//! Handles user registration, login, token refresh and the current user.
//!
//! Author: hephaex@gmail.com

use axum::{extract::State, http::HeaderMap, response::IntoResponse, Extension};
use std::sync::Arc;

use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::extract::ValidatedJson;
use crate::messages::MessageKey;
use crate::models::{LoginRequest, RefreshRequest, RegisterRequest, UserResponse};
use crate::response::ApiResponse;
use crate::state::AppState;

/// Register a new user account
///
/// Self-registration always creates a `user` role account.
///
/// # Responses
/// - 201: user created
/// - 400: validation failed or email already in use
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = request.email.clone();
    let ip_address = extract_ip_address(&headers);

    let user = match state.users.register(request).await {
        Ok(user) => user,
        Err(e) => {
            audit_log(&AuditEvent::RegistrationFailure {
                email,
                reason: e.to_string(),
                ip_address,
            });
            return Err(e);
        }
    };

    audit_log(&AuditEvent::RegistrationSuccess {
        user_id: user.id,
        email: user.email.clone(),
        ip_address,
    });

    Ok(ApiResponse::created(UserResponse::from(user)).message(MessageKey::Registered))
}

/// Login with email and password
///
/// # Responses
/// - 200: access and refresh tokens plus the user
/// - 400: validation failed
/// - 401: invalid email or password
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = request.email.clone();
    let ip_address = extract_ip_address(&headers);
    let user_agent = extract_user_agent(&headers);

    match state.users.login(request).await {
        Ok(login) => {
            audit_log(&AuditEvent::LoginSuccess {
                user_id: login.user.id,
                email: login.user.email.clone(),
                ip_address,
                user_agent,
            });
            Ok(ApiResponse::ok(login).message(MessageKey::LoggedIn))
        }
        Err(e) => {
            audit_log(&AuditEvent::LoginFailure {
                email,
                reason: e.to_string(),
                ip_address,
                user_agent,
            });
            Err(e)
        }
    }
}

/// Exchange a refresh token for a new access token
///
/// # Responses
/// - 200: new access token
/// - 401: invalid, expired or wrong-type refresh token
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = state.users.refresh(&request.refresh_token).await;

    audit_log(&AuditEvent::TokenRefresh {
        ip_address: extract_ip_address(&headers),
        success: result.is_ok(),
    });

    Ok(ApiResponse::ok(result?).message(MessageKey::TokenRefreshed))
}

/// Get current user info
///
/// Reads the stored record, so a deleted account answers 404 even while its
/// access token is still valid.
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.users.current_user(current.user_id).await?;
    Ok(ApiResponse::ok(UserResponse::from(user)))
}
