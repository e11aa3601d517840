//! Queue Orchestrator (C6): the four public operations (Join, Status,
//! Enter, Leave). Composes the script runner (C1), the store (C2), the
//! estimator (C3), the admitter (C4), and the heartbeat reaper (C5).

use crate::error::AppError;
use crate::queue::admitter::TokenBucketAdmitter;
use crate::queue::estimator::SlidingWindowEstimator;
use crate::queue::heartbeat::{HeartbeatReaper, ReapOutcome};
use crate::store::{RoomStore, WaitingSession};
use serde::Serialize;
use uuid::Uuid;

const SESSION_DEDUPE_TTL_SECS: u64 = 300;
const RESERVATION_TTL_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JoinResult {
    pub waiting_token: String,
    pub position_hint: u64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusResult {
    pub status: String,
    pub position: u64,
    pub eta_sec: u32,
    pub confidence: f64,
    pub waiting_time_secs: i64,
    pub ready_for_entry: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EnterResult {
    pub admission: String,
    pub reservation_token: String,
    pub ttl_sec: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LeaveResult {
    pub status: String,
}

/// Eligibility table from the Status/Enter contract: position-gated,
/// with a minimum wait applied outside the top VIP band.
pub fn eligible(position: u64, waited_secs: i64) -> bool {
    match position {
        0..=10 => waited_secs >= 0,
        11..=50 => waited_secs >= 2,
        51..=100 => waited_secs >= 5,
        _ => false,
    }
}

pub struct QueueOrchestrator {
    store: RoomStore,
    estimator: SlidingWindowEstimator,
    admitter: TokenBucketAdmitter,
}

impl QueueOrchestrator {
    pub fn new(
        store: RoomStore,
        estimator: SlidingWindowEstimator,
        admitter: TokenBucketAdmitter,
    ) -> Self {
        Self {
            store,
            estimator,
            admitter,
        }
    }

    pub async fn join(
        &mut self,
        event_id: &str,
        user_id: &str,
        idempotency_key: Option<&str>,
        vip: bool,
        now: i64,
    ) -> Result<JoinResult, AppError> {
        if event_id.is_empty() {
            return Err(AppError::MissingEventId);
        }

        let token = Uuid::new_v4().to_string();
        let key = idempotency_key
            .map(str::to_string)
            .unwrap_or_else(|| format!("{user_id}:{event_id}:{}", now / 10));

        let session = WaitingSession {
            token: token.clone(),
            event_id: event_id.to_string(),
            user_id: user_id.to_string(),
            joined_at_epoch_secs: now,
            vip,
            status: "waiting".to_string(),
        };

        let outcome = self
            .store
            .enqueue(
                event_id,
                user_id,
                &token,
                &key,
                &session,
                now as f64,
                SESSION_DEDUPE_TTL_SECS,
            )
            .await?;

        if outcome.is_none() {
            return Err(AppError::DuplicateRequest);
        }

        self.store
            .touch_heartbeat(event_id, &token, 300)
            .await
            .unwrap_or(());

        Ok(JoinResult {
            waiting_token: token,
            position_hint: 0,
            status: "waiting".to_string(),
        })
    }

    /// Looks up the waiter's event from its session before doing any
    /// index-scoped work — the external contract only carries `token`
    /// for Status/Enter/Leave.
    async fn resolve_event_id(&mut self, token: &str) -> Result<String, AppError> {
        self.store
            .read_session(token)
            .await?
            .map(|s| s.event_id)
            .ok_or(AppError::TokenNotFound)
    }

    pub async fn status(&mut self, token: &str, now: i64) -> Result<StatusResult, AppError> {
        let event_id = self.resolve_event_id(token).await?;

        if HeartbeatReaper::check(&mut self.store, &event_id, token).await? == ReapOutcome::Evicted {
            return Err(AppError::TokenExpired);
        }

        let session = self
            .store
            .read_session(token)
            .await?
            .ok_or(AppError::TokenNotFound)?;

        let position = match self.store.rank(&event_id, token).await? {
            // The index rank is 0-based; the external position contract
            // is 1-based, so a lone remaining waiter reports position 1,
            // not 0.
            Some(rank) => rank + 1,
            None => return Err(AppError::TokenNotFound),
        };

        let estimate = self.estimator.estimate(&event_id, position, now).await?;
        let waited = (now - session.joined_at_epoch_secs).max(0);
        let ready_for_entry = eligible(position, waited);

        Ok(StatusResult {
            status: session.status.clone(),
            position,
            eta_sec: estimate.eta_seconds,
            confidence: estimate.confidence,
            waiting_time_secs: waited,
            ready_for_entry,
        })
    }

    pub async fn enter(&mut self, token: &str, now: i64) -> Result<EnterResult, AppError> {
        let session = self
            .store
            .read_session(token)
            .await?
            .ok_or(AppError::TokenNotFound)?;
        let event_id = session.event_id.clone();

        let position = self
            .store
            .rank(&event_id, token)
            .await?
            .ok_or(AppError::TokenNotFound)?
            + 1;

        let waited = (now - session.joined_at_epoch_secs).max(0);
        if !eligible(position, waited) {
            return Err(AppError::NotReady);
        }

        if position > 10 {
            let admitted = self.admitter.try_admit(&event_id, now as f64).await?;
            if !admitted {
                return Err(AppError::NotReady);
            }
        }

        let reservation_token = Uuid::new_v4().to_string();
        let reservation = ReservationRecord {
            event_id: event_id.clone(),
            user_id: session.user_id.clone(),
            waiting_token: token.to_string(),
            granted_at: now,
        };
        let reservation_json = serde_json::to_string(&reservation)
            .map_err(|e| AppError::Internal(format!("failed to serialize reservation: {e}")))?;

        self.store
            .release(
                &event_id,
                token,
                &reservation_token,
                &reservation_json,
                RESERVATION_TTL_SECS,
            )
            .await?;

        let mut ready_session = session.clone();
        ready_session.status = "ready".to_string();
        self.store
            .write_session(token, &ready_session, crate::store::room::SESSION_TTL_SECS)
            .await?;

        self.estimator.record_admission(&event_id, now).await?;

        Ok(EnterResult {
            admission: "granted".to_string(),
            reservation_token,
            ttl_sec: RESERVATION_TTL_SECS,
        })
    }

    /// Idempotent: always returns `left`, even if the token was never
    /// known or was already removed.
    pub async fn leave(&mut self, token: &str) -> Result<LeaveResult, AppError> {
        if let Some(session) = self.store.read_session(token).await? {
            self.store.remove_from_index(&session.event_id, token).await?;
            self.store
                .delete_log_entry(&session.event_id, &session.user_id, token)
                .await?;
        }
        self.store.delete_session(token).await?;
        Ok(LeaveResult {
            status: "left".to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, serde::Deserialize)]
struct ReservationRecord {
    event_id: String,
    user_id: String,
    waiting_token: String,
    granted_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vip_band_has_no_wait_requirement() {
        assert!(eligible(1, 0));
        assert!(eligible(10, 0));
    }

    #[test]
    fn mid_band_requires_two_second_wait() {
        assert!(!eligible(11, 1));
        assert!(eligible(11, 2));
        assert!(eligible(50, 2));
    }

    #[test]
    fn outer_band_requires_five_second_wait() {
        assert!(!eligible(51, 4));
        assert!(eligible(51, 5));
        assert!(eligible(100, 5));
    }

    #[test]
    fn beyond_band_never_eligible() {
        assert!(!eligible(101, 1_000_000));
    }
}
