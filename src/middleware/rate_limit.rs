use axum::{
    body::Body,
    extract::{ConnectInfo, Request},
    http::{Response as HttpResponse, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_governor::{governor::GovernorConfigBuilder, GovernorError, GovernorLayer};

/// Type alias for the global governor layer (IP-based rate limiting)
pub type GlobalGovernorLayer = GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    Body,
>;

/// Create a GovernorLayer for global rate limiting (per IP address)
/// - 120 requests per minute, one token every 500ms
/// - A map click and a calculation each cost one request, so bursts stay small
pub fn create_global_governor() -> Option<GlobalGovernorLayer> {
    let config = GovernorConfigBuilder::default()
        .per_millisecond(500)
        .burst_size(30)
        .finish()?;

    Some(GovernorLayer::new(Arc::new(config)).error_handler(rate_limit_error_handler))
}

pub fn rate_limit_error_handler(error: GovernorError) -> HttpResponse<Body> {
    match error {
        GovernorError::TooManyRequests { wait_time, .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": format!("Too many requests, retry in {} seconds", wait_time),
            })),
        )
            .into_response(),
        GovernorError::UnableToExtractKey => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "Unable to identify client" })),
        )
            .into_response(),
        GovernorError::Other { code, msg, .. } => (
            code,
            Json(serde_json::json!({ "error": msg.unwrap_or_default() })),
        )
            .into_response(),
    }
}

/// Logs every request with the client IP and latency. Throttled requests
/// and server errors are raised above debug; 4xx answers such as a map click
/// before the origin are part of normal flow.
pub async fn log_request(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let client_ip = addr.ip();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            tracing::warn!(%client_ip, %method, path = %path, "Throttled by per-IP limit")
        }
        s if s.is_server_error() => {
            tracing::error!(%client_ip, %method, path = %path, status = s.as_u16(), elapsed_ms, "Request errored")
        }
        s if s.is_client_error() => {
            tracing::info!(%client_ip, %method, path = %path, status = s.as_u16(), elapsed_ms, "Request refused")
        }
        s => {
            tracing::debug!(%client_ip, %method, path = %path, status = s.as_u16(), elapsed_ms, "Request served")
        }
    }

    response
}
