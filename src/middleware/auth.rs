use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};

use crate::error::{AppError, AppResult};
use crate::utils::jwt::verify_token;
use crate::AppState;

pub const LOGIN_REQUIRED: &str = "Você precisa estar logado para solicitar uma corrida!";

/// Access gate for ride-request actions.
///
/// Passes everything through while the gate is switched off. Otherwise the
/// request needs a valid bearer token from `/api/auth/login`; the verified
/// claims are stored in the request extensions.
pub async fn access_gate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    if !state.config.access_gate_enabled {
        return Ok(next.run(request).await);
    }

    let auth = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::LoginRequired(LOGIN_REQUIRED.to_string()))?;

    let claims = verify_token(auth.token(), &state.config.jwt_secret).map_err(|e| {
        tracing::debug!(error = %e, "Rejected access token");
        AppError::LoginRequired(LOGIN_REQUIRED.to_string())
    })?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
