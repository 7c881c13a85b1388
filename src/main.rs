use std::error::Error;
use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pet_ride_express::{
    config::Config,
    middleware::rate_limit::{create_global_governor, log_request},
    routes, AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pet_ride_express=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        access_gate = config.access_gate_enabled,
        "Starting server at {}",
        config.server_addr()
    );

    let addr: SocketAddr = config.server_addr().parse()?;
    let state = AppState::from_config(config)?;

    let governor = create_global_governor().ok_or("Invalid rate limit configuration")?;

    // Create router with middleware
    let app = routes::create_router(state)
        .layer(governor)
        .layer(middleware::from_fn(log_request))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(CatchPanicLayer::custom(handle_panic));

    // Start server with socket address for rate limiting
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// A panicking handler must not take the server down
fn handle_panic(_panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    tracing::error!("Handler panicked, request answered with 500");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}
