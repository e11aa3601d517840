//! Shared application state, constructed once at startup and cloned
//! (cheaply, via `Arc`/`ConnectionManager`'s internal sharing) into each
//! request.

use crate::auth::AuthConfig;
use crate::config::AppConfig;
use crate::downstream::DownstreamProxy;
use crate::guardrails::{IdempotencyCache, PrincipalRateLimiter};
use crate::queue::QueueOrchestrator;
use crate::store::ScriptRunner;
use metrics_exporter_prometheus::PrometheusHandle;
use redis::aio::ConnectionManager;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub redis: ConnectionManager,
    pub scripts: Arc<ScriptRunner>,
    pub auth: Arc<AuthConfig>,
    pub rate_limiter: PrincipalRateLimiter,
    pub idempotency_cache: IdempotencyCache,
    pub downstream: Arc<DownstreamProxy>,
    pub prometheus_handle: PrometheusHandle,
}

impl AppState {
    /// Build a fresh orchestrator for this request. Cheap: the
    /// constituent pieces only wrap a `ConnectionManager` clone and an
    /// `Arc<ScriptRunner>`, rather than keeping a stateful object alive
    /// across requests.
    pub fn orchestrator(&self) -> QueueOrchestrator {
        let store = crate::store::RoomStore::new(self.redis.clone(), self.scripts.clone());
        let estimator = crate::queue::SlidingWindowEstimator::new(self.redis.clone());
        let admitter = crate::queue::TokenBucketAdmitter::new(self.redis.clone(), self.scripts.clone());
        QueueOrchestrator::new(store, estimator, admitter)
    }
}
