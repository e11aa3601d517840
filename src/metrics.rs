//! Prometheus metrics wiring, built on `metrics` +
//! `metrics-exporter-prometheus` (see DESIGN.md for why these were
//! pulled in rather than hand-rolled).

use axum::extract::MatchedPath;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Request-scoped metrics: counts and a latency histogram per
/// `(method, route, status)`.
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or_else(|| req.uri().path())
        .to_string();

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed = start.elapsed();
    let status = response.status().as_u16().to_string();

    metrics::counter!(
        "http_server_requests_total",
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => status,
    )
    .increment(1);

    metrics::histogram!(
        "http_server_requests_duration_seconds",
        "method" => method,
        "route" => route,
    )
    .record(elapsed.as_secs_f64());

    response
}

pub fn record_rate_limit_drop() {
    metrics::counter!("ratelimit_dropped_total").increment(1);
}

pub fn record_idempotency_hit() {
    metrics::counter!("idempotency_hits_total").increment(1);
}

pub fn record_queue_operation(operation: &'static str) {
    metrics::counter!("queue_operations_total", "operation" => operation).increment(1);
}
