//! Error taxonomy and JSON error envelope.
//!
//! Every error surfaced to an HTTP caller carries a stable `code`, a
//! human-readable `message`, and an optional `trace_id`. Mirrors the
//! `ApiError`/`IntoResponse` pattern the rest of this codebase's sibling
//! services use, but with the full taxonomy this subsystem's contract
//! requires.

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone)]
pub enum AppError {
    // Client input
    InvalidRequest(String),
    MissingEventId,
    MissingToken,
    InvalidScenario(String),

    // Auth
    Unauthenticated,
    InvalidCredentials,
    UsernameExists,
    TokenExpired,
    InvalidToken(String),

    // Queue semantics
    DuplicateRequest,
    TokenNotFound,
    NotReady,

    // Idempotency
    Conflict(String),

    // Downstream
    PaymentNotApproved(String),
    UpstreamTimeout,
    ReservationConflict(String),
    ReservationNotFound,

    // Rate limiting
    RateLimited { retry_after_secs: u64 },

    // Internal
    QueueError(String),
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::MissingEventId => "MISSING_EVENT_ID",
            Self::MissingToken => "MISSING_TOKEN",
            Self::InvalidScenario(_) => "INVALID_SCENARIO",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::UsernameExists => "USERNAME_EXISTS",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::InvalidToken(_) => "INVALID_TOKEN",
            Self::DuplicateRequest => "DUPLICATE_REQUEST",
            Self::TokenNotFound => "TOKEN_NOT_FOUND",
            Self::NotReady => "NOT_READY",
            Self::Conflict(_) => "CONFLICT",
            Self::PaymentNotApproved(_) => "PAYMENT_NOT_APPROVED",
            Self::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            Self::ReservationConflict(_) => "RESERVATION_CONFLICT",
            Self::ReservationNotFound => "RESERVATION_NOT_FOUND",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::QueueError(_) => "QUEUE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_)
            | Self::MissingEventId
            | Self::MissingToken
            | Self::InvalidScenario(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated | Self::InvalidCredentials | Self::InvalidToken(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::UsernameExists => StatusCode::CONFLICT,
            Self::TokenExpired => StatusCode::NOT_FOUND,
            Self::DuplicateRequest => StatusCode::CONFLICT,
            Self::TokenNotFound => StatusCode::NOT_FOUND,
            Self::NotReady => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PaymentNotApproved(_) => StatusCode::PRECONDITION_FAILED,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::ReservationConflict(_) => StatusCode::CONFLICT,
            Self::ReservationNotFound => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::QueueError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::InvalidRequest(m) => m.clone(),
            Self::MissingEventId => "event_id is required".to_string(),
            Self::MissingToken => "token is required".to_string(),
            Self::InvalidScenario(m) => m.clone(),
            Self::Unauthenticated => "authentication required".to_string(),
            Self::InvalidCredentials => "invalid username or password".to_string(),
            Self::UsernameExists => "username already registered".to_string(),
            Self::TokenExpired => "waiting token expired".to_string(),
            Self::InvalidToken(m) => m.clone(),
            Self::DuplicateRequest => "duplicate join request".to_string(),
            Self::TokenNotFound => "waiting token not found".to_string(),
            Self::NotReady => "caller is not yet eligible for entry".to_string(),
            Self::Conflict(m) => m.clone(),
            Self::PaymentNotApproved(m) => m.clone(),
            Self::UpstreamTimeout => "downstream call timed out".to_string(),
            Self::ReservationConflict(m) => m.clone(),
            Self::ReservationNotFound => "reservation not found".to_string(),
            Self::RateLimited { retry_after_secs } => {
                format!("rate limit exceeded, retry after {retry_after_secs}s")
            }
            Self::QueueError(m) => m.clone(),
            Self::Internal(m) => m.clone(),
        }
    }

    /// Attach a trace id, producing the response envelope's `trace_id` field.
    pub fn with_trace(self, trace_id: Option<String>) -> TracedAppError {
        TracedAppError {
            error: self,
            trace_id,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() || err.is_io_error() {
            Self::Internal(format!("store transport error: {err}"))
        } else {
            Self::QueueError(format!("store error: {err}"))
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace_id: Option<String>,
}

/// An `AppError` with its trace id resolved, ready to render.
pub struct TracedAppError {
    error: AppError,
    trace_id: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.with_trace(None).into_response()
    }
}

impl IntoResponse for TracedAppError {
    fn into_response(self) -> Response {
        let status = self.error.status();
        let retry_after = match &self.error {
            AppError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.error.code(),
                message: self.error.message(),
                trace_id: self.trace_id,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_taxonomy() {
        assert_eq!(AppError::MissingEventId.code(), "MISSING_EVENT_ID");
        assert_eq!(AppError::DuplicateRequest.code(), "DUPLICATE_REQUEST");
        assert_eq!(AppError::NotReady.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::TokenExpired.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::RateLimited { retry_after_secs: 5 }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn redis_timeout_maps_to_internal() {
        let err = redis::RedisError::from(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "timed out",
        ));
        let mapped: AppError = err.into();
        assert_eq!(mapped.code(), "INTERNAL_ERROR");
    }
}
