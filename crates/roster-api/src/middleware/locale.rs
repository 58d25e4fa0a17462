//! Per-request message language
//!
//! Negotiates the envelope language from `Accept-Language`, falling back to
//! the configured default, and keeps it in scope for everything downstream.
//! The choice is echoed as `Content-Language`.

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::messages::{negotiate, with_language};
use crate::state::AppState;

pub async fn locale_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let accept = request
        .headers()
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok());
    let language = negotiate(accept, state.config.language);

    let mut response = with_language(language, next.run(request)).await;
    response.headers_mut().insert(
        header::CONTENT_LANGUAGE,
        HeaderValue::from_static(language.code()),
    );
    response
}
