//! Authentication and authorization middleware
//!
//! `auth_middleware` turns a `Bearer` access token into a [`CurrentUser`]
//! in request extensions. `require_role` reads that identity, so it must be
//! layered inside the authentication middleware. Either one short-circuits
//! with an error envelope; the handler never runs.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use roster_core::Role;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

use super::jwt::{Claims, TokenError};
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::AppError;
use crate::state::AppState;

/// Identity of the authenticated caller
///
/// Inserted into request extensions by [`auth_middleware`]; handlers read it
/// with `Extension<CurrentUser>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub user_id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Admins manage everyone; other users only themselves
    pub fn can_manage(&self, user_id: i64) -> bool {
        self.is_admin() || self.user_id == user_id
    }
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email,
            name: claims.name,
            role: claims.role,
        }
    }
}

/// Authentication middleware errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingAuthHeader,

    #[error("authorization header must be 'Bearer <token>'")]
    InvalidAuthHeader,

    #[error("invalid or expired token")]
    InvalidToken(#[from] TokenError),

    #[error("insufficient permissions")]
    InsufficientPermissions,
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InsufficientPermissions => AppError::forbidden(err.to_string()),
            other => AppError::unauthorized(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

/// Extract the token from an exact `Bearer <token>` header value
fn bearer_token(value: &str) -> Result<&str, AuthError> {
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeader)?;
    if token.is_empty() || token.contains(' ') {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}

/// Authentication middleware that requires a valid access token
///
/// ```ignore
/// let protected = Router::new()
///     .route("/auth/me", get(auth::me_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let result = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)
        .and_then(|value| value.to_str().map_err(|_| AuthError::InvalidAuthHeader))
        .and_then(bearer_token)
        .and_then(|token| {
            state
                .tokens
                .validate_access_token(token)
                .map_err(AuthError::from)
        });

    let claims = match result {
        Ok(claims) => claims,
        Err(e) => {
            audit_log(&AuditEvent::InvalidToken {
                reason: match &e {
                    AuthError::InvalidToken(inner) => inner.to_string(),
                    other => other.to_string(),
                },
                ip_address: extract_ip_address(request.headers()),
                user_agent: extract_user_agent(request.headers()),
            });
            return Err(e);
        }
    };

    request.extensions_mut().insert(CurrentUser::from(claims));

    Ok(next.run(request).await)
}

/// Type alias for role middleware future
type RoleMiddlewareFuture = Pin<Box<dyn Future<Output = Result<Response, AuthError>> + Send>>;

/// Middleware factory for role-based access control
///
/// Admins pass every check; anyone else needs exactly `required_role`.
///
/// ```ignore
/// let admin_only = post(users::create_user_handler)
///     .route_layer(middleware::from_fn(require_role(Role::Admin)));
/// ```
pub fn require_role(
    required_role: Role,
) -> impl Fn(Request, Next) -> RoleMiddlewareFuture + Clone + Send + 'static {
    move |request: Request, next: Next| {
        Box::pin(async move {
            let user = request
                .extensions()
                .get::<CurrentUser>()
                .cloned()
                .ok_or(AuthError::MissingAuthHeader)?;

            if !user.role.satisfies(required_role) {
                audit_log(&AuditEvent::AccessDenied {
                    user_id: user.user_id,
                    email: user.email.clone(),
                    resource: format!("{} {}", request.method(), request.uri().path()),
                    required_role: Some(required_role.to_string()),
                    ip_address: extract_ip_address(request.headers()),
                });
                return Err(AuthError::InsufficientPermissions);
            }

            Ok(next.run(request).await)
        })
    }
}
