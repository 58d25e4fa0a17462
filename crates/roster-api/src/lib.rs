//! Roster API - REST server for user management
//!
//! Layered as handler → service → repository. Handlers validate transport
//! input, the service applies business rules, and the repository persists
//! users. Every response is wrapped in the uniform [`response::Envelope`].
//!
//! Author: hephaex@gmail.com

pub mod audit;
pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod messages;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod service;
pub mod state;

use axum::{
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware as axum_middleware,
    response::Response,
    routing::get,
    Router,
};
use roster_core::{AppConfig, LoggingConfig, RunMode};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any as AnyOrigin, CorsLayer},
    timeout::{RequestBodyTimeoutLayer, TimeoutLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

use crate::error::{ErrorReport, INTERNAL_ERROR_MESSAGE};
use crate::messages::MessageKey;
use crate::middleware::{
    locale_middleware, normalize_errors, request_id_middleware, security_headers_middleware,
    RequestId, REQUEST_ID_HEADER,
};
use crate::state::AppState;

/// Build the full application router.
///
/// Layers, outermost first: request id, message language, panic recovery,
/// tracing, CORS, security headers, error normalization, timeouts, then the
/// routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let mode = state.config.mode;
    let write_timeout = Duration::from_secs(state.config.server.write_timeout_secs);
    let read_timeout = Duration::from_secs(state.config.server.read_timeout_secs);
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .fallback(handlers::not_found_handler)
        .layer(TimeoutLayer::new(write_timeout))
        .layer(RequestBodyTimeoutLayer::new(read_timeout))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            normalize_errors,
        ))
        .layer(axum_middleware::from_fn(security_headers_middleware))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<axum::body::Body>| {
                let request_id = request
                    .extensions()
                    .get::<RequestId>()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(CatchPanicLayer::custom(move |panic: Box<dyn Any + Send + 'static>| {
            panic_response(panic, mode)
        }))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            locale_middleware,
        ))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .with_state(state)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>, mode: RunMode) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "Handler panicked");

    ErrorReport {
        status: axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        key: MessageKey::InternalError,
        reason: INTERNAL_ERROR_MESSAGE.to_string(),
        detail: Some(detail),
    }
    .render(mode)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, request_id.clone()])
        .expose_headers([request_id]);

    if origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(AnyOrigin);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},audit=info", config.level))
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

/// Open the database, build the router and serve until Ctrl-C.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    config.validate()?;

    let addr = config.bind_address();
    if config.mode.is_debug() {
        tracing::warn!("Running in debug mode; internal error details are exposed");
    }

    let state = Arc::new(AppState::connect(config).await?);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Roster API server starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Shutdown listener failed");
            }
        })
        .await?;

    tracing::info!("Roster API server stopped");
    Ok(())
}
