//! Idempotency-Key guardrail (C7b).
//!
//! For mutating requests the caller may (and for reservation/payment
//! endpoints must) supply an `Idempotency-Key` UUID v4. The cache stores
//! a fingerprint of the request body alongside the response so a retry
//! with the same key and the same body replays the cached response,
//! while the same key with a different body is rejected as a conflict.

use crate::error::AppError;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const CACHE_TTL_SECS: u64 = 300;

/// `(method, path)` pairs that require a valid `Idempotency-Key` header.
const REQUIRED_PATHS: &[(Method, &str)] = &[
    (Method::POST, "/api/v1/reservations"),
    (Method::POST, "/api/v1/payment/intent"),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    pub fingerprint: String,
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdempotencyCheck {
    /// No prior entry; caller should proceed and then `store` the result.
    Fresh,
    /// Same key, same body: replay this cached response.
    Replay(CachedResponse),
}

pub fn is_valid_uuid_v4(key: &str) -> bool {
    Uuid::parse_str(key)
        .map(|u| u.get_version_num() == 4)
        .unwrap_or(false)
}

pub fn fingerprint(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    hex::encode(digest)
}

#[derive(Clone)]
pub struct IdempotencyCache {
    conn: ConnectionManager,
}

impl IdempotencyCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Look up `key`, comparing `fingerprint` against any existing entry.
    /// Returns `Err(AppError::Conflict)` if the key is reused with a
    /// different body.
    pub async fn check(
        &mut self,
        key: &str,
        fingerprint: &str,
    ) -> Result<IdempotencyCheck, AppError> {
        let cache_key = crate::store::keys::idempotency_cache(key);
        let raw: Option<String> = self.conn.get(&cache_key).await?;

        match raw {
            None => Ok(IdempotencyCheck::Fresh),
            Some(raw) => {
                let cached: CachedResponse = serde_json::from_str(&raw)
                    .map_err(|e| AppError::Internal(format!("corrupt idempotency entry: {e}")))?;
                if cached.fingerprint == fingerprint {
                    Ok(IdempotencyCheck::Replay(cached))
                } else {
                    Err(AppError::Conflict(
                        "idempotency key reused with a different request body".to_string(),
                    ))
                }
            }
        }
    }

    pub async fn store(
        &mut self,
        key: &str,
        fingerprint: &str,
        status: u16,
        body: &str,
    ) -> Result<(), AppError> {
        let cache_key = crate::store::keys::idempotency_cache(key);
        let entry = CachedResponse {
            fingerprint: fingerprint.to_string(),
            status,
            body: body.to_string(),
        };
        let payload = serde_json::to_string(&entry)
            .map_err(|e| AppError::Internal(format!("failed to serialize cache entry: {e}")))?;
        self.conn
            .set_ex::<_, _, ()>(&cache_key, payload, CACHE_TTL_SECS)
            .await?;
        Ok(())
    }
}

/// Enforces the `Idempotency-Key` header on mutating reservation/payment
/// endpoints, replaying a cached response on a repeat key + body and
/// rejecting a reused key with a different body. Requests to any other
/// route pass straight through untouched.
pub async fn idempotency_middleware(
    State(cache): State<IdempotencyCache>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    if !REQUIRED_PATHS
        .iter()
        .any(|(m, p)| *m == method && *p == path)
    {
        return next.run(req).await;
    }

    let key = match req
        .headers()
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
    {
        Some(raw) if is_valid_uuid_v4(raw) => raw.to_string(),
        Some(_) => {
            return AppError::InvalidRequest(
                "Idempotency-Key must be a valid UUID v4".to_string(),
            )
            .into_response()
        }
        None => {
            return AppError::InvalidRequest("Idempotency-Key header is required".to_string())
                .into_response()
        }
    };

    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return AppError::InvalidRequest("failed to read request body".to_string())
                .into_response()
        }
    };
    let fp = fingerprint(&bytes);

    let mut cache = cache;
    match cache.check(&key, &fp).await {
        Ok(IdempotencyCheck::Replay(cached)) => {
            crate::metrics::record_idempotency_hit();
            let status = StatusCode::from_u16(cached.status).unwrap_or(StatusCode::OK);
            let mut response = Response::new(Body::from(cached.body));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(axum::http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            return response;
        }
        Ok(IdempotencyCheck::Fresh) => {}
        Err(err) => return err.into_response(),
    }

    let req = Request::from_parts(parts, Body::from(bytes));
    let response = next.run(req).await;

    let (resp_parts, resp_body) = response.into_parts();
    let resp_bytes = match axum::body::to_bytes(resp_body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return AppError::Internal("failed to read downstream response body".to_string())
                .into_response()
        }
    };

    if let Err(err) = cache
        .store(
            &key,
            &fp,
            resp_parts.status.as_u16(),
            &String::from_utf8_lossy(&resp_bytes),
        )
        .await
    {
        tracing::warn!(error = %err, "failed to store idempotency cache entry");
    }

    Response::from_parts(resp_parts, Body::from(resp_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_uuid_v4() {
        assert!(is_valid_uuid_v4(&Uuid::new_v4().to_string()));
    }

    #[test]
    fn rejects_non_uuid() {
        assert!(!is_valid_uuid_v4("not-a-uuid"));
    }

    #[test]
    fn required_paths_cover_reservations_and_payment_intent() {
        assert!(REQUIRED_PATHS.contains(&(Method::POST, "/api/v1/reservations")));
        assert!(REQUIRED_PATHS.contains(&(Method::POST, "/api/v1/payment/intent")));
        assert!(!REQUIRED_PATHS.contains(&(Method::GET, "/api/v1/reservations")));
    }

    #[test]
    fn rejects_uuid_v1() {
        // a nil UUID has version 0, not 4
        assert!(!is_valid_uuid_v4(&Uuid::nil().to_string()));
    }

    #[test]
    fn fingerprint_is_stable_for_same_body() {
        let a = fingerprint(b"{\"foo\":1}");
        let b = fingerprint(b"{\"foo\":1}");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_for_different_body() {
        let a = fingerprint(b"{\"foo\":1}");
        let b = fingerprint(b"{\"foo\":2}");
        assert_ne!(a, b);
    }
}
