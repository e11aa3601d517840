//! Payment endpoints: thin pass-throughs to the downstream proxy (C8).

use crate::auth::AuthenticatedPrincipal;
use crate::downstream::{Money, PaymentIntent, PaymentStatus};
use crate::error::AppResult;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    pub reservation_id: String,
    pub amount: i64,
    pub currency: String,
    pub scenario: String,
}

pub async fn create_intent(
    State(state): State<AppState>,
    principal: AuthenticatedPrincipal,
    Json(req): Json<CreateIntentRequest>,
) -> AppResult<Json<PaymentIntent>> {
    let intent = state
        .downstream
        .create_payment_intent(
            &req.reservation_id,
            &principal.subject,
            Money {
                amount: req.amount,
                currency: req.currency,
            },
            &req.scenario,
        )
        .await?;
    Ok(Json(intent))
}

pub async fn get_status(
    State(state): State<AppState>,
    _principal: AuthenticatedPrincipal,
    Path(id): Path<String>,
) -> AppResult<Json<PaymentStatus>> {
    let status = state.downstream.get_payment_status(&id).await?;
    Ok(Json(status))
}
