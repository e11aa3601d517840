//! Queue endpoints: Join, Status, Enter, Leave.

use crate::auth::AuthenticatedPrincipal;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub event_id: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub waiting_token: String,
    pub position_hint: u64,
    pub status: String,
}

pub async fn join(
    State(state): State<AppState>,
    principal: Option<AuthenticatedPrincipal>,
    Json(req): Json<JoinRequest>,
) -> AppResult<(axum::http::StatusCode, Json<JoinResponse>)> {
    if req.event_id.is_empty() {
        return Err(AppError::MissingEventId);
    }

    let user_id = req
        .user_id
        .or_else(|| principal.map(|p| p.subject))
        .unwrap_or_else(|| "anonymous".to_string());

    let now = chrono::Utc::now().timestamp();
    let mut orchestrator = state.orchestrator();
    let result = orchestrator.join(&req.event_id, &user_id, None, false, now).await?;
    crate::metrics::record_queue_operation("join");

    Ok((
        axum::http::StatusCode::ACCEPTED,
        Json(JoinResponse {
            waiting_token: result.waiting_token,
            position_hint: result.position_hint,
            status: result.status,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub position: u64,
    pub eta_sec: u32,
    pub waiting_time: i64,
    pub ready_for_entry: bool,
}

pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> AppResult<Json<StatusResponse>> {
    let now = chrono::Utc::now().timestamp();
    let mut orchestrator = state.orchestrator();
    let result = orchestrator.status(&query.token, now).await?;
    crate::metrics::record_queue_operation("status");

    Ok(Json(StatusResponse {
        status: result.status,
        position: result.position,
        eta_sec: result.eta_sec,
        waiting_time: result.waiting_time_secs,
        ready_for_entry: result.ready_for_entry,
    }))
}

#[derive(Debug, Deserialize)]
pub struct EnterRequest {
    pub waiting_token: String,
}

#[derive(Debug, Serialize)]
pub struct EnterResponse {
    pub admission: String,
    pub reservation_token: String,
    pub ttl_sec: u64,
}

pub async fn enter(
    State(state): State<AppState>,
    _principal: AuthenticatedPrincipal,
    Json(req): Json<EnterRequest>,
) -> AppResult<Json<EnterResponse>> {
    let now = chrono::Utc::now().timestamp();
    let mut orchestrator = state.orchestrator();
    let result = orchestrator.enter(&req.waiting_token, now).await?;
    crate::metrics::record_queue_operation("enter");

    Ok(Json(EnterResponse {
        admission: result.admission,
        reservation_token: result.reservation_token,
        ttl_sec: result.ttl_sec,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LeaveQuery {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct LeaveResponse {
    pub status: String,
}

pub async fn leave(
    State(state): State<AppState>,
    Query(query): Query<LeaveQuery>,
) -> AppResult<Json<LeaveResponse>> {
    let mut orchestrator = state.orchestrator();
    let result = orchestrator.leave(&query.token).await?;
    crate::metrics::record_queue_operation("leave");
    Ok(Json(LeaveResponse {
        status: result.status,
    }))
}
