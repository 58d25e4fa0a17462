//! Request correlation identifier
//!
//! Reuses a client supplied `X-Request-ID` or generates a UUID v4. The id is
//! kept in task-local storage for the lifetime of the request, so envelopes
//! and log lines can read it without threading it through every call. It is
//! also inserted into request extensions and echoed back as a response header.
//!
//! Task-locals are not inherited by spawned tasks; wrap such futures in
//! [`RequestId::scope`] to carry the id along.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::future::Future;
use tokio::task_local;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest client supplied id that is accepted verbatim
const MAX_REQUEST_ID_LEN: usize = 128;

task_local! {
    static REQUEST_ID: RequestId;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The id of the request being handled on this task, if any
    pub fn current() -> Option<Self> {
        REQUEST_ID.try_with(|id| id.clone()).ok()
    }

    /// Run `fut` with `id` in scope
    pub async fn scope<F: Future>(id: RequestId, fut: F) -> F::Output {
        REQUEST_ID.scope(id, fut).await
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn from_header(value: &HeaderValue) -> Option<RequestId> {
    let id = value.to_str().ok()?.trim();
    if id.is_empty() || id.len() > MAX_REQUEST_ID_LEN {
        return None;
    }
    Some(RequestId::new(id))
}

/// Assign a request id and keep it in scope for everything downstream
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(from_header)
        .unwrap_or_else(RequestId::generate);

    request.extensions_mut().insert(id.clone());

    let mut response = RequestId::scope(id.clone(), next.run(request)).await;

    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    response
}
