//! Waiting-room store (C2): a typed wrapper over the Redis connection
//! exposing the operations the queue orchestrator needs. Keeps raw
//! command names out of the rest of the codebase the way `database.rs`
//! wraps `sqlx::query_as` calls for its callers.

use crate::error::AppError;
use crate::store::keys;
use crate::store::scripts::ScriptRunner;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

/// A waiter's durable session record, stored as a JSON blob at
/// `queue:waiting:{token}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WaitingSession {
    pub token: String,
    pub event_id: String,
    pub user_id: String,
    pub joined_at_epoch_secs: i64,
    pub vip: bool,
    pub status: String,
}

/// Session TTL: refreshed on every write (Join, and the Enter rewrite
/// to `status = "ready"`).
pub const SESSION_TTL_SECS: u64 = 1800;
/// Position-index TTL, refreshed on every insertion so an event with no
/// further joins eventually drops out of the store.
const POSITION_INDEX_TTL_SECS: i64 = 3600;

#[derive(Clone)]
pub struct RoomStore {
    conn: ConnectionManager,
    scripts: std::sync::Arc<ScriptRunner>,
}

impl RoomStore {
    pub fn new(conn: ConnectionManager, scripts: std::sync::Arc<ScriptRunner>) -> Self {
        Self { conn, scripts }
    }

    /// Append to the per-user log and, if not a duplicate, write the
    /// waiting session and insert into the position index. Returns the
    /// stream entry id on success, `None` if this was a duplicate join.
    #[allow(clippy::too_many_arguments)]
    pub async fn enqueue(
        &mut self,
        event_id: &str,
        user_id: &str,
        token: &str,
        idempotency_key: &str,
        session: &WaitingSession,
        score: f64,
        dedupe_ttl_secs: u64,
    ) -> Result<Option<String>, AppError> {
        let dedupe_key = keys::dedupe(event_id, idempotency_key);
        let log_key = keys::per_user_log(event_id, user_id);

        let outcome = self
            .scripts
            .enqueue(
                &mut self.conn,
                &dedupe_key,
                &log_key,
                token,
                event_id,
                user_id,
                dedupe_ttl_secs,
            )
            .await?;

        if !outcome.ok {
            return Ok(None);
        }

        self.write_session(token, session, SESSION_TTL_SECS).await?;

        self.conn
            .zadd::<_, _, _, ()>(keys::position_index(event_id), token, score)
            .await?;
        self.conn
            .expire::<_, ()>(keys::position_index(event_id), POSITION_INDEX_TTL_SECS)
            .await?;
        self.conn
            .zadd::<_, _, _, ()>(keys::legacy_position_index(event_id), token, score)
            .await?;
        self.conn
            .expire::<_, ()>(keys::legacy_position_index(event_id), POSITION_INDEX_TTL_SECS)
            .await?;

        Ok(Some(outcome.data))
    }

    /// Write (or rewrite) a waiter's session record with a fresh TTL.
    /// Used by Join and by Enter's post-release `status = "ready"`
    /// rewrite.
    pub async fn write_session(
        &mut self,
        token: &str,
        session: &WaitingSession,
        ttl_secs: u64,
    ) -> Result<(), AppError> {
        let payload = serde_json::to_string(session)
            .map_err(|e| AppError::Internal(format!("failed to serialize session: {e}")))?;
        self.conn
            .set_ex::<_, _, ()>(keys::waiting_session(token), payload, ttl_secs)
            .await?;
        Ok(())
    }

    pub async fn read_session(&mut self, token: &str) -> Result<Option<WaitingSession>, AppError> {
        let raw: Option<String> = self.conn.get(keys::waiting_session(token)).await?;
        match raw {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| AppError::Internal(format!("corrupt session record: {e}"))),
        }
    }

    pub async fn delete_session(&mut self, token: &str) -> Result<(), AppError> {
        self.conn
            .del::<_, ()>(keys::waiting_session(token))
            .await?;
        Ok(())
    }

    /// 0-based rank within the position index, ascending by join score.
    /// `None` means the token is not present (already admitted or evicted).
    pub async fn rank(&mut self, event_id: &str, token: &str) -> Result<Option<u64>, AppError> {
        let rank: Option<u64> = self
            .conn
            .zrank(keys::position_index(event_id), token)
            .await?;
        Ok(rank)
    }

    pub async fn queue_size(&mut self, event_id: &str) -> Result<u64, AppError> {
        let size: u64 = self.conn.zcard(keys::position_index(event_id)).await?;
        Ok(size)
    }

    pub async fn remove_from_index(&mut self, event_id: &str, token: &str) -> Result<(), AppError> {
        self.conn
            .zrem::<_, _, ()>(keys::position_index(event_id), token)
            .await?;
        self.conn
            .zrem::<_, _, ()>(keys::legacy_position_index(event_id), token)
            .await?;
        Ok(())
    }

    /// Bounded scan of a user's per-event log for the entry carrying
    /// `token`, deleting it. Budget is small: logs are per-user and
    /// short-lived (TTL 1h), so a full-range `XRANGE` stays cheap.
    pub async fn delete_log_entry(
        &mut self,
        event_id: &str,
        user_id: &str,
        token: &str,
    ) -> Result<(), AppError> {
        let log_key = keys::per_user_log(event_id, user_id);
        let reply: redis::streams::StreamRangeReply = self.conn.xrange_all(&log_key).await?;

        for entry in reply.ids {
            let matches = entry
                .map
                .get("token")
                .and_then(|v| redis::from_redis_value::<String>(v).ok())
                .is_some_and(|v| v == token);
            if matches {
                self.conn.xdel::<_, _, ()>(&log_key, &[entry.id]).await?;
                break;
            }
        }
        Ok(())
    }

    pub async fn touch_heartbeat(
        &mut self,
        event_id: &str,
        token: &str,
        ttl_secs: u64,
    ) -> Result<(), AppError> {
        self.conn
            .set_ex::<_, _, ()>(keys::heartbeat(event_id, token), "1", ttl_secs)
            .await?;
        Ok(())
    }

    pub async fn heartbeat_present(&mut self, event_id: &str, token: &str) -> Result<bool, AppError> {
        let present: bool = self.conn.exists(keys::heartbeat(event_id, token)).await?;
        Ok(present)
    }

    /// Scan `count` of the lowest-ranked tokens in the index whose
    /// heartbeat has lapsed, then evict them. Returns the evicted tokens.
    /// Bounded linear scan, run lazily on `Status` polls (see C5).
    pub async fn reap_expired(
        &mut self,
        event_id: &str,
        scan_count: isize,
    ) -> Result<Vec<String>, AppError> {
        let candidates: Vec<String> = self
            .conn
            .zrange(keys::position_index(event_id), 0, scan_count - 1)
            .await?;

        let mut evicted = Vec::new();
        for token in candidates {
            if !self.heartbeat_present(event_id, &token).await? {
                self.remove_from_index(event_id, &token).await?;
                self.delete_session(&token).await?;
                evicted.push(token);
            }
        }
        Ok(evicted)
    }

    /// Atomically removes the waiter from both index keys and clears its
    /// heartbeat (see invariant I5 in `scripts::RELEASE_ATOMIC`), then
    /// writes the reservation record under its own `reservation_token`
    /// key — the caller-facing token handed back to the waiter, distinct
    /// from the waiting token used to look it up in the index.
    pub async fn release(
        &mut self,
        event_id: &str,
        token: &str,
        reservation_token: &str,
        reservation_json: &str,
        reservation_ttl_secs: u64,
    ) -> Result<(), AppError> {
        let outcome = self
            .scripts
            .release(
                &mut self.conn,
                &keys::position_index(event_id),
                &keys::legacy_position_index(event_id),
                &keys::heartbeat(event_id, token),
                token,
            )
            .await?;
        if !outcome.ok {
            return Err(AppError::Internal(
                "release_atomic returned unexpected status".to_string(),
            ));
        }

        self.conn
            .set_ex::<_, _, ()>(
                keys::reservation_token(reservation_token),
                reservation_json,
                reservation_ttl_secs,
            )
            .await?;
        Ok(())
    }

    pub async fn read_reservation(&mut self, reservation_token: &str) -> Result<Option<String>, AppError> {
        let raw: Option<String> = self.conn.get(keys::reservation_token(reservation_token)).await?;
        Ok(raw)
    }

    /// Raw access to the connection manager for callers that need
    /// operations this wrapper doesn't expose (guardrails, admission).
    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }

    pub fn scripts(&self) -> std::sync::Arc<ScriptRunner> {
        self.scripts.clone()
    }
}
