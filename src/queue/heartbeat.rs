//! Heartbeat Reaper (C5).
//!
//! Per-request lazy cleanup, invoked at the top of every `Status` call.
//! No background sweeper runs; cleanup piggybacks on polling traffic so
//! abandoned waiters fall out of the index without a dedicated job.

use crate::error::AppError;
use crate::store::RoomStore;

const HEARTBEAT_TTL_SECS: u64 = 300;

pub struct HeartbeatReaper;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapOutcome {
    /// The heartbeat was present and has been refreshed.
    Alive,
    /// The heartbeat had lapsed; the waiter was evicted from the index
    /// and its session deleted.
    Evicted,
}

impl HeartbeatReaper {
    /// Check and refresh/evict a single waiter's heartbeat.
    pub async fn check(
        store: &mut RoomStore,
        event_id: &str,
        token: &str,
    ) -> Result<ReapOutcome, AppError> {
        if store.heartbeat_present(event_id, token).await? {
            store
                .touch_heartbeat(event_id, token, HEARTBEAT_TTL_SECS)
                .await?;
            Ok(ReapOutcome::Alive)
        } else {
            let session = store.read_session(token).await?;
            store.remove_from_index(event_id, token).await?;
            if let Some(session) = &session {
                store
                    .delete_log_entry(event_id, &session.user_id, token)
                    .await?;
            }
            store.delete_session(token).await?;
            Ok(ReapOutcome::Evicted)
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn heartbeat_ttl_is_five_minutes() {
        assert_eq!(super::HEARTBEAT_TTL_SECS, 300);
    }
}
