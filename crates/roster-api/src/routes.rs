//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::auth::{auth_middleware, require_role};
use crate::handlers::{auth, users};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use roster_core::Role;
use std::sync::Arc;

/// Create API v1 routes
///
/// Authentication is a `route_layer`, so unmatched paths fall through to the
/// fallback as 404 instead of 401.
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/refresh", post(auth::refresh_handler));

    // Role check runs inside authentication, which inserts the identity
    let users_collection = get(users::list_users).merge(
        post(users::create_user).route_layer(middleware::from_fn(require_role(Role::Admin))),
    );

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route("/users", users_collection)
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}
