//! Smoke test for the stateless health endpoints, in the style of this
//! codebase's sibling `cors_test.rs`: build a small router and drive it
//! with `tower::ServiceExt::oneshot` rather than binding a socket.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use tower::util::ServiceExt;
use waitingroom_backend::api::health::{healthz, version};

#[tokio::test]
async fn healthz_reports_ok() {
    let app = Router::new().route("/healthz", get(healthz));
    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn version_reports_package_version() {
    let app = Router::new().route("/version", get(version));
    let response = app
        .oneshot(Request::builder().uri("/version").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}
