use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::utils::jwt::create_token;
use crate::AppState;

/// Where the client goes after a successful login
pub const HOME_PAGE: &str = "/index.html";
pub const INVALID_CREDENTIALS: &str = "Email ou senha incorretos!";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// The access flag; the client keeps it in local storage
    pub token: String,
    pub redirect: &'static str,
}

/// Login with email and password
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let email = payload.email.trim();
    let password = payload.password.trim();

    if !state.credentials.verify(email, password).await {
        tracing::info!(email, "Rejected login");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let token = create_token(
        email,
        &state.config.jwt_secret,
        state.config.jwt_expiration_hours,
    )?;
    tracing::info!(email, "Logged in");

    Ok(Json(LoginResponse {
        token,
        redirect: HOME_PAGE,
    }))
}
