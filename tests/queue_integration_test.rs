//! End-to-end queue scenarios against a real store. Gated behind
//! `#[ignore]` since they require `REDIS_URL` pointing at a live
//! instance; run explicitly with `cargo test -- --ignored`.

use std::sync::Arc;
use waitingroom_backend::queue::{QueueOrchestrator, SlidingWindowEstimator, TokenBucketAdmitter};
use waitingroom_backend::store::{RoomStore, ScriptRunner};

async fn orchestrator_for(event_id: &str) -> (QueueOrchestrator, String) {
    let redis_url = std::env::var("REDIS_URL").expect("REDIS_URL must be set for this test");
    let client = redis::Client::open(redis_url).unwrap();
    let conn = client.get_connection_manager().await.unwrap();
    let scripts = Arc::new(ScriptRunner::new());
    let store = RoomStore::new(conn.clone(), scripts.clone());
    let estimator = SlidingWindowEstimator::new(conn.clone());
    let admitter = TokenBucketAdmitter::new(conn, scripts);
    (
        QueueOrchestrator::new(store, estimator, admitter),
        event_id.to_string(),
    )
}

#[tokio::test]
#[ignore]
async fn join_then_status_reports_vip_position() {
    let (mut orchestrator, event_id) = orchestrator_for("evt_integration_vip").await;
    let now = 1_000_000;

    let join = orchestrator
        .join(&event_id, "user-1", None, false, now)
        .await
        .unwrap();

    let status = orchestrator
        .status(&join.waiting_token, now)
        .await
        .unwrap();

    assert_eq!(status.position, 1);
    assert!(status.ready_for_entry);
}

#[tokio::test]
#[ignore]
async fn duplicate_join_is_rejected() {
    let (mut orchestrator, event_id) = orchestrator_for("evt_integration_dup").await;
    let now = 2_000_000;

    let first = orchestrator
        .join(&event_id, "user-2", Some("fixed-key"), false, now)
        .await
        .unwrap();
    assert!(!first.waiting_token.is_empty());

    let second = orchestrator
        .join(&event_id, "user-2", Some("fixed-key"), false, now)
        .await;

    assert!(matches!(
        second,
        Err(waitingroom_backend::error::AppError::DuplicateRequest)
    ));
}

#[tokio::test]
#[ignore]
async fn enter_then_leave_round_trip() {
    let (mut orchestrator, event_id) = orchestrator_for("evt_integration_enter").await;
    let now = 3_000_000;

    let join = orchestrator
        .join(&event_id, "user-3", None, false, now)
        .await
        .unwrap();

    let enter = orchestrator
        .enter(&join.waiting_token, now + 1)
        .await
        .unwrap();
    assert_eq!(enter.admission, "granted");

    // token already consumed by Enter; Leave is still idempotent.
    let leave = orchestrator.leave(&join.waiting_token).await.unwrap();
    assert_eq!(leave.status, "left");
}
