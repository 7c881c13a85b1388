use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::handlers::{auth, trip};
use crate::middleware::auth::access_gate;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    let auth_routes = Router::new().route("/login", post(auth::login));

    // Map interaction and pricing, open to everyone
    let session_routes = Router::new()
        .route("/", post(trip::create_session))
        .route("/{id}", get(trip::get_session).delete(trip::end_session))
        .route("/{id}/origin", put(trip::set_origin))
        .route("/{id}/destination", post(trip::select_destination))
        .route("/{id}/trip", post(trip::calculate_trip))
        .route("/{id}/surcharges", put(trip::update_surcharges))
        .route("/{id}/cancel", post(trip::cancel_request));

    // Ride-request actions behind the access gate
    let gated_routes = Router::new()
        .route("/{id}/confirm", post(trip::confirm_request))
        .route("/{id}/send", post(trip::send_request))
        .layer(middleware::from_fn_with_state(state.clone(), access_gate));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/sessions", session_routes.merge(gated_routes))
        .with_state(state)
}
