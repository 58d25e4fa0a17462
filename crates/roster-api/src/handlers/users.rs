//! User management handlers
//!
//! Every route here sits behind `auth_middleware`. Creation additionally
//! requires the admin role; update and delete are open to admins and to the
//! account owner.
//!
//! Author: hephaex@gmail.com

use axum::{extract::State, http::HeaderMap, response::IntoResponse, Extension};
use std::sync::Arc;

use crate::audit::{audit_log, extract_ip_address, AuditEvent};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::extract::{UserId, ValidatedJson};
use crate::messages::MessageKey;
use crate::models::{CreateUserRequest, DeleteResponse, UpdateUserRequest, UserResponse};
use crate::response::ApiResponse;
use crate::state::AppState;

/// Reject callers that are neither admin nor the target user
fn ensure_can_manage(
    current: &CurrentUser,
    target: i64,
    action: &str,
    headers: &HeaderMap,
) -> Result<(), AppError> {
    if current.can_manage(target) {
        return Ok(());
    }

    audit_log(&AuditEvent::AccessDenied {
        user_id: current.user_id,
        email: current.email.clone(),
        resource: format!("{action} /api/v1/users/{target}"),
        required_role: None,
        ip_address: extract_ip_address(headers),
    });
    Err(AppError::forbidden("insufficient permissions"))
}

/// List all users, newest first
///
/// # Responses
/// - 200: list of users (possibly empty)
/// - 401: missing or invalid token
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let users: Vec<UserResponse> = state
        .users
        .get_all_users()
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();

    Ok(ApiResponse::ok(users))
}

/// Create a user with an optional role (admin only)
///
/// # Responses
/// - 201: user created
/// - 400: validation failed or email already in use
/// - 403: caller is not an admin
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.users.create_user(request).await?;
    Ok(ApiResponse::created(UserResponse::from(user)))
}

/// Get a user by id
///
/// # Responses
/// - 200: the user
/// - 400: id is not a positive integer
/// - 404: no such user
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    UserId(id): UserId,
) -> Result<impl IntoResponse, AppError> {
    let user = state.users.get_user_by_id(id).await?;
    Ok(ApiResponse::ok(UserResponse::from(user)))
}

/// Partially update a user
///
/// Only fields present in the body change. Role changes require admin.
///
/// # Responses
/// - 200: updated user
/// - 400: validation failed or email already in use
/// - 403: not admin and not the account owner, or non-admin role change
/// - 404: no such user
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    headers: HeaderMap,
    UserId(id): UserId,
    ValidatedJson(request): ValidatedJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_can_manage(&current, id, "PUT", &headers)?;

    // Non-admins reach here only for their own account; restating the
    // current role is harmless
    let role_changed = request.role.is_some();
    if !current.is_admin() && request.role.is_some_and(|role| role != current.role) {
        audit_log(&AuditEvent::AccessDenied {
            user_id: current.user_id,
            email: current.email.clone(),
            resource: format!("PUT /api/v1/users/{id} role"),
            required_role: Some("admin".to_string()),
            ip_address: extract_ip_address(&headers),
        });
        return Err(AppError::forbidden("only admins can change roles"));
    }

    if request.is_empty() {
        let user = state.users.get_user_by_id(id).await?;
        let response = ApiResponse::ok(UserResponse::from(user));
        return Ok(response.message(MessageKey::NothingToUpdate));
    }

    let user = state.users.update_user(id, request).await?;

    audit_log(&AuditEvent::UserUpdated {
        user_id: user.id,
        actor_id: current.user_id,
        role_changed,
    });

    Ok(ApiResponse::ok(UserResponse::from(user)).message(MessageKey::Updated))
}

/// Delete a user
///
/// # Responses
/// - 200: `{id, deleted: true}`
/// - 400: id is not a positive integer
/// - 403: not admin and not the account owner
/// - 404: no such user
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    headers: HeaderMap,
    UserId(id): UserId,
) -> Result<impl IntoResponse, AppError> {
    ensure_can_manage(&current, id, "DELETE", &headers)?;

    state.users.delete_user(id).await?;

    audit_log(&AuditEvent::UserDeleted {
        user_id: id,
        actor_id: current.user_id,
    });

    Ok(ApiResponse::ok(DeleteResponse { id, deleted: true }).message(MessageKey::Deleted))
}
