//! Reservation endpoints: thin pass-throughs to the downstream proxy
//! (C8). Idempotency and auth are enforced by middleware before these
//! handlers run.

use crate::auth::AuthenticatedPrincipal;
use crate::downstream::{Reservation, ReservationRequest};
use crate::error::AppResult;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    pub event_id: String,
    pub seat_ids: Vec<String>,
    pub quantity: u32,
    pub reservation_token: String,
}

pub async fn create_reservation(
    State(state): State<AppState>,
    principal: AuthenticatedPrincipal,
    Json(req): Json<CreateReservationRequest>,
) -> AppResult<(axum::http::StatusCode, Json<Reservation>)> {
    let rpc_request = ReservationRequest {
        event_id: req.event_id,
        seat_ids: req.seat_ids,
        quantity: req.quantity,
        reservation_token: req.reservation_token,
        user_id: principal.subject,
    };
    let reservation = state.downstream.create_reservation(&rpc_request).await?;
    Ok((axum::http::StatusCode::CREATED, Json(reservation)))
}

pub async fn get_reservation(
    State(state): State<AppState>,
    _principal: AuthenticatedPrincipal,
    Path(id): Path<String>,
) -> AppResult<Json<Reservation>> {
    let reservation = state.downstream.get_reservation(&id).await?;
    Ok(Json(reservation))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub payment_intent_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub order_id: String,
    pub status: String,
}

pub async fn confirm_reservation(
    State(state): State<AppState>,
    _principal: AuthenticatedPrincipal,
    Path(id): Path<String>,
    Json(req): Json<ConfirmRequest>,
) -> AppResult<Json<ConfirmResponse>> {
    let result = state
        .downstream
        .confirm_reservation(&id, req.payment_intent_id.as_deref())
        .await?;
    Ok(Json(ConfirmResponse {
        order_id: result.order_id,
        status: result.status,
    }))
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub status: String,
}

pub async fn cancel_reservation(
    State(state): State<AppState>,
    _principal: AuthenticatedPrincipal,
    Path(id): Path<String>,
) -> AppResult<Json<CancelResponse>> {
    state.downstream.cancel_reservation(&id).await?;
    Ok(Json(CancelResponse {
        status: "CANCELLED".to_string(),
    }))
}
