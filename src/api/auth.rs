//! Local-mode Login/Register endpoints.
//!
//! Only meaningful when `AUTH_MODE=local`; calling these against an
//! external-mode deployment returns an internal error since there is no
//! durable user store to check against.

use crate::auth::{AuthResponse, AuthVerifier};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    match &state.auth.verifier {
        AuthVerifier::Local(service) => {
            let response = service.login(&req.username, &req.password).await?;
            Ok(Json(response))
        }
        AuthVerifier::External(_) => Err(AppError::Internal(
            "local login is disabled when AUTH_MODE=external".to_string(),
        )),
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    pub display_name: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(axum::http::StatusCode, Json<AuthResponse>)> {
    match &state.auth.verifier {
        AuthVerifier::Local(service) => {
            let response = service
                .register(&req.username, &req.password, &req.email, &req.display_name)
                .await?;
            Ok((axum::http::StatusCode::CREATED, Json(response)))
        }
        AuthVerifier::External(_) => Err(AppError::Internal(
            "local registration is disabled when AUTH_MODE=external".to_string(),
        )),
    }
}
