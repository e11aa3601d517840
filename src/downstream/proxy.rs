//! Downstream Proxy (C8): typed façade for the reservation and payment
//! RPC contracts. When a target URL is configured it is called for
//! real via `reqwest`; otherwise calls resolve against a deterministic
//! in-process mock so the crate runs standalone for demos and tests —
//! the same `mock_mode` fallback this codebase's sibling `rpc/stellar.rs`
//! uses when no live endpoint is configured.

use crate::downstream::circuit::{with_retry, CircuitBreaker, CircuitBreakerConfig, RetryConfig};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const RESERVATION_DEADLINE: Duration = Duration::from_millis(600);
const PAYMENT_DEADLINE: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub event_id: String,
    pub seat_ids: Vec<String>,
    pub quantity: u32,
    pub reservation_token: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: String,
    pub event_id: String,
    pub seat_ids: Vec<String>,
    pub quantity: u32,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmResult {
    pub order_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Money {
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub payment_intent_id: String,
    pub reservation_id: String,
    pub amount: Money,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatus {
    pub payment_intent_id: String,
    pub status: String,
}

/// RPC façade. Holds its own circuit breaker per downstream (reservation
/// service, payment service) so one failing dependency does not trip
/// retries against the other.
pub struct DownstreamProxy {
    client: reqwest::Client,
    reservation_url: Option<String>,
    payment_url: Option<String>,
    reservation_breaker: Arc<Mutex<CircuitBreaker>>,
    payment_breaker: Arc<Mutex<CircuitBreaker>>,
}

impl DownstreamProxy {
    pub fn new(client: reqwest::Client, reservation_url: Option<String>, payment_url: Option<String>) -> Self {
        Self {
            client,
            reservation_url,
            payment_url,
            reservation_breaker: Arc::new(Mutex::new(CircuitBreaker::new(CircuitBreakerConfig::default()))),
            payment_breaker: Arc::new(Mutex::new(CircuitBreaker::new(CircuitBreakerConfig::default()))),
        }
    }

    pub async fn create_reservation(&self, req: &ReservationRequest) -> Result<Reservation, AppError> {
        if let Some(base) = &self.reservation_url {
            let url = format!("{base}/reservations");
            return self.call_reservation_rpc(|| self.post_json(&url, req)).await;
        }
        Ok(Reservation {
            reservation_id: format!("resv_{}", &req.reservation_token[..8.min(req.reservation_token.len())]),
            event_id: req.event_id.clone(),
            seat_ids: req.seat_ids.clone(),
            quantity: req.quantity,
            status: "PENDING".to_string(),
        })
    }

    pub async fn get_reservation(&self, id: &str) -> Result<Reservation, AppError> {
        if let Some(base) = &self.reservation_url {
            let url = format!("{base}/reservations/{id}");
            return self
                .call_reservation_rpc(|| self.get_json(&url))
                .await;
        }
        Ok(Reservation {
            reservation_id: id.to_string(),
            event_id: "mock_event".to_string(),
            seat_ids: vec![],
            quantity: 1,
            status: "PENDING".to_string(),
        })
    }

    pub async fn confirm_reservation(
        &self,
        id: &str,
        payment_intent_id: Option<&str>,
    ) -> Result<ConfirmResult, AppError> {
        if let Some(base) = &self.reservation_url {
            let url = format!("{base}/reservations/{id}/confirm");
            let body = serde_json::json!({ "payment_intent_id": payment_intent_id });
            return self
                .call_reservation_rpc(|| self.post_json(&url, &body))
                .await;
        }
        Ok(ConfirmResult {
            order_id: format!("order_{id}"),
            status: "CONFIRMED".to_string(),
        })
    }

    pub async fn cancel_reservation(&self, id: &str) -> Result<(), AppError> {
        if let Some(base) = &self.reservation_url {
            let url = format!("{base}/reservations/{id}/cancel");
            let _: serde_json::Value = self
                .call_reservation_rpc(|| self.post_json(&url, &serde_json::json!({})))
                .await?;
        }
        Ok(())
    }

    pub async fn create_payment_intent(
        &self,
        reservation_id: &str,
        user_id: &str,
        amount: Money,
        scenario: &str,
    ) -> Result<PaymentIntent, AppError> {
        if let Some(base) = &self.payment_url {
            let url = format!("{base}/payment/intent");
            let body = serde_json::json!({
                "reservation_id": reservation_id,
                "user_id": user_id,
                "amount": amount,
                "scenario": scenario,
            });
            return self.call_payment_rpc(|| self.post_json(&url, &body)).await;
        }

        let status = match scenario {
            "decline" => "DECLINED",
            "timeout" => return Err(AppError::UpstreamTimeout),
            _ => "APPROVED",
        };
        Ok(PaymentIntent {
            payment_intent_id: format!("pi_{reservation_id}"),
            reservation_id: reservation_id.to_string(),
            amount,
            status: status.to_string(),
        })
    }

    pub async fn get_payment_status(&self, payment_intent_id: &str) -> Result<PaymentStatus, AppError> {
        if let Some(base) = &self.payment_url {
            let url = format!("{base}/payment/{payment_intent_id}/status");
            return self.call_payment_rpc(|| self.get_json(&url)).await;
        }
        Ok(PaymentStatus {
            payment_intent_id: payment_intent_id.to_string(),
            status: "APPROVED".to_string(),
        })
    }

    pub async fn process_payment(&self, payment_intent_id: &str) -> Result<PaymentStatus, AppError> {
        self.get_payment_status(payment_intent_id).await
    }

    async fn call_reservation_rpc<T, F, Fut>(&self, op: F) -> Result<T, AppError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, AppError>>,
    {
        let result = with_retry(
            &self.reservation_breaker,
            RetryConfig::default(),
            |err: &AppError| matches!(err, AppError::UpstreamTimeout | AppError::Internal(_)),
            || async { flatten_timeout(tokio::time::timeout(RESERVATION_DEADLINE, op()).await) },
        )
        .await;
        unwrap_circuit(result)
    }

    async fn call_payment_rpc<T, F, Fut>(&self, op: F) -> Result<T, AppError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, AppError>>,
    {
        let result = with_retry(
            &self.payment_breaker,
            RetryConfig::default(),
            |err: &AppError| matches!(err, AppError::UpstreamTimeout | AppError::Internal(_)),
            || async { flatten_timeout(tokio::time::timeout(PAYMENT_DEADLINE, op()).await) },
        )
        .await;
        unwrap_circuit(result)
    }

    async fn post_json<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, AppError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("downstream call failed: {e}")))?;
        response
            .json::<T>()
            .await
            .map_err(|e| AppError::Internal(format!("downstream response decode failed: {e}")))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, AppError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("downstream call failed: {e}")))?;
        response
            .json::<T>()
            .await
            .map_err(|e| AppError::Internal(format!("downstream response decode failed: {e}")))
    }
}

fn flatten_timeout<T>(
    result: Result<Result<T, AppError>, tokio::time::error::Elapsed>,
) -> Result<T, AppError> {
    match result {
        Ok(inner) => inner,
        Err(_) => Err(AppError::UpstreamTimeout),
    }
}

fn unwrap_circuit<T>(
    result: Result<T, crate::downstream::circuit::CircuitError<AppError>>,
) -> Result<T, AppError> {
    match result {
        Ok(value) => Ok(value),
        Err(crate::downstream::circuit::CircuitError::Open) => Err(AppError::UpstreamTimeout),
        Err(crate::downstream::circuit::CircuitError::Inner(err)) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_proxy() -> DownstreamProxy {
        DownstreamProxy::new(reqwest::Client::new(), None, None)
    }

    #[tokio::test]
    async fn mock_create_reservation_succeeds() {
        let proxy = mock_proxy();
        let req = ReservationRequest {
            event_id: "evt_1".to_string(),
            seat_ids: vec!["A1".to_string()],
            quantity: 1,
            reservation_token: "tok_abcdef".to_string(),
            user_id: "u1".to_string(),
        };
        let reservation = proxy.create_reservation(&req).await.unwrap();
        assert_eq!(reservation.status, "PENDING");
    }

    #[tokio::test]
    async fn mock_payment_decline_scenario() {
        let proxy = mock_proxy();
        let intent = proxy
            .create_payment_intent("resv_1", "u1", Money { amount: 100, currency: "usd".to_string() }, "decline")
            .await
            .unwrap();
        assert_eq!(intent.status, "DECLINED");
    }

    #[tokio::test]
    async fn mock_payment_timeout_scenario() {
        let proxy = mock_proxy();
        let result = proxy
            .create_payment_intent("resv_1", "u1", Money { amount: 100, currency: "usd".to_string() }, "timeout")
            .await;
        assert!(matches!(result, Err(AppError::UpstreamTimeout)));
    }
}
