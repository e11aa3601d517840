//! Per-principal request rate limiting (C7a).
//!
//! Token-bucket keyed by the authenticated subject (falling back to the
//! client address for unauthenticated callers), enforced via the same
//! atomic script the admission controller uses. Grounded on this
//! codebase's sibling `rate_limit.rs`, which layers a Redis-backed
//! limiter with header injection in front of axum handlers; here the
//! bucket state itself also lives in the store rather than in memory,
//! since every instance must agree on one principal's budget.

use crate::error::AppError;
use crate::store::scripts::ScriptRunner;
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use redis::aio::ConnectionManager;
use std::sync::Arc;

pub const DEFAULT_RPS: u32 = 50;
pub const DEFAULT_BURST: u32 = 100;

/// Paths exempt from per-principal rate limiting.
const EXEMPT_PATHS: &[&str] = &["/healthz", "/readyz", "/metrics"];

#[derive(Clone)]
pub struct PrincipalRateLimiter {
    conn: ConnectionManager,
    scripts: Arc<ScriptRunner>,
    capacity: f64,
    refill_per_sec: f64,
}

impl PrincipalRateLimiter {
    pub fn new(
        conn: ConnectionManager,
        scripts: Arc<ScriptRunner>,
        rps: u32,
        burst: u32,
    ) -> Self {
        Self {
            conn,
            scripts,
            capacity: burst as f64,
            refill_per_sec: rps as f64,
        }
    }

    /// Returns whether the request is admitted along with the bucket's
    /// remaining token count, so the caller can surface `X-RateLimit-*`
    /// headers without a second round-trip.
    pub async fn check(&mut self, principal: &str, now: f64) -> Result<(bool, f64), AppError> {
        let key = crate::store::keys::principal_rate_bucket(principal);
        let outcome = self
            .scripts
            .admit(&mut self.conn, &key, self.capacity, self.refill_per_sec, now)
            .await?;
        let remaining: f64 = outcome.data.parse().unwrap_or(0.0);
        Ok((outcome.ok, remaining))
    }

    fn reset_after_secs(&self, remaining: f64) -> u64 {
        if remaining >= self.capacity {
            0
        } else {
            ((self.capacity - remaining) / self.refill_per_sec).ceil() as u64
        }
    }
}

/// Extract the principal this request should be rate-limited under.
/// Prefers the authenticated subject (set by the auth middleware),
/// falling back to the caller's socket address.
fn rate_limit_key(req: &Request) -> String {
    if let Some(principal) = req.extensions().get::<crate::auth::AuthenticatedPrincipal>() {
        return format!("sub:{}", principal.subject);
    }
    if let Some(addr) = req
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
    {
        return format!("addr:{}", addr.0);
    }
    "anonymous".to_string()
}

pub async fn rate_limit_middleware(
    State(limiter): State<PrincipalRateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    if EXEMPT_PATHS.contains(&path.as_str()) {
        return next.run(req).await;
    }

    let key = rate_limit_key(&req);
    let now = chrono::Utc::now().timestamp() as f64;

    let mut limiter = limiter;
    match limiter.check(&key, now).await {
        Ok((true, remaining)) => {
            let mut response = next.run(req).await;
            apply_rate_limit_headers(&mut response, &limiter, remaining);
            response
        }
        Ok((false, remaining)) => {
            use axum::response::IntoResponse;
            crate::metrics::record_rate_limit_drop();
            let mut response = AppError::RateLimited {
                retry_after_secs: limiter.reset_after_secs(remaining),
            }
            .into_response();
            apply_rate_limit_headers(&mut response, &limiter, remaining);
            response
        }
        Err(err) => {
            tracing::warn!(error = %err, "rate limit check failed, failing open");
            next.run(req).await
        }
    }
}

fn apply_rate_limit_headers(response: &mut Response, limiter: &PrincipalRateLimiter, remaining: f64) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&(limiter.capacity as u64).to_string()) {
        headers.insert("X-RateLimit-Limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&(remaining.max(0.0) as u64).to_string()) {
        headers.insert("X-RateLimit-Remaining", value);
    }
    if let Ok(value) = HeaderValue::from_str(&limiter.reset_after_secs(remaining).to_string()) {
        headers.insert("X-RateLimit-Reset", value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exempt_paths_cover_health_endpoints() {
        assert!(EXEMPT_PATHS.contains(&"/healthz"));
        assert!(EXEMPT_PATHS.contains(&"/readyz"));
        assert!(EXEMPT_PATHS.contains(&"/metrics"));
    }

    #[test]
    fn defaults_are_fifty_rps_hundred_burst() {
        assert_eq!(DEFAULT_RPS, 50);
        assert_eq!(DEFAULT_BURST, 100);
    }
}
