//! Terminal error normalization
//!
//! Runs after the handler. Responses carrying an [`ErrorReport`] are
//! re-rendered for the configured run mode; error statuses produced without
//! one (framework rejections, method mismatches, panics) are replaced with
//! the generic envelope for their status. Successful responses pass through
//! untouched.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use roster_core::RunMode;
use std::sync::Arc;

use crate::error::ErrorReport;
use crate::state::AppState;

pub async fn normalize_errors(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    normalize(response, state.config.mode)
}

pub(crate) fn normalize(mut response: Response, mode: RunMode) -> Response {
    if let Some(report) = response.extensions_mut().remove::<ErrorReport>() {
        return report.render(mode);
    }

    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        tracing::debug!(status = %status, "Normalizing unreported error response");
        return ErrorReport::generic(status).render(mode);
    }

    response
}
