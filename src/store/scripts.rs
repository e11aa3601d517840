//! Atomic Script Runner (C1).
//!
//! Loads the three pre-registered scripts at startup and executes them
//! against the store. Scripts return a positional two-element array
//! `{status, payload}` — `status` is `0` (logical error) or `1`
//! (success) and `payload` is always a string. Positional encoding is
//! used because not every store scripting layer round-trips map returns
//! reliably.

use crate::error::AppError;
use redis::aio::ConnectionLike;
use redis::{RedisResult, Script};

/// Parsed result of a script invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutcome {
    pub ok: bool,
    pub data: String,
}

impl ScriptOutcome {
    fn from_redis(raw: Vec<redis::Value>) -> Result<Self, AppError> {
        if raw.len() != 2 {
            return Err(AppError::Internal(format!(
                "script returned {} elements, expected 2",
                raw.len()
            )));
        }

        let status = match &raw[0] {
            redis::Value::Int(n) => *n,
            other => {
                return Err(AppError::Internal(format!(
                    "script status field had unexpected type: {other:?}"
                )))
            }
        };

        let data = match &raw[1] {
            redis::Value::Data(bytes) => String::from_utf8_lossy(bytes).to_string(),
            redis::Value::Int(n) => n.to_string(),
            redis::Value::Status(s) => s.clone(),
            redis::Value::Nil => String::new(),
            other => {
                return Err(AppError::Internal(format!(
                    "script payload field had unexpected type: {other:?}"
                )))
            }
        };

        Ok(Self {
            ok: status == 1,
            data,
        })
    }
}

/// Enqueue a waiter: dedupe-checked append to the per-user log.
///
/// KEYS: [dedupe_key, log_key]
/// ARGV: [token, event_id, user_id, dedupe_ttl_secs]
/// Returns: {1, log_id} | {0, "DUPLICATE"}
const ENQUEUE_ATOMIC: &str = r#"
local dedupe_key = KEYS[1]
local log_key = KEYS[2]
local token = ARGV[1]
local event_id = ARGV[2]
local user_id = ARGV[3]
local dedupe_ttl = tonumber(ARGV[4])

if redis.call('EXISTS', dedupe_key) == 1 then
    return {0, "DUPLICATE"}
end

local log_id = redis.call('XADD', log_key, '*', 'token', token, 'event_id', event_id, 'user_id', user_id)
redis.call('EXPIRE', log_key, 3600)
redis.call('SET', dedupe_key, 'processing', 'EX', dedupe_ttl)

return {1, log_id}
"#;

/// Token-bucket admission check (C4).
///
/// KEYS: [bucket_key]
/// ARGV: [capacity, refill_rate_per_sec, now_epoch_secs]
/// Returns: {1, remaining_tokens} | {0, remaining_tokens}
const ADMIT_ATOMIC: &str = r#"
local bucket_key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_rate = tonumber(ARGV[2])
local now = tonumber(ARGV[3])

local tokens = tonumber(redis.call('HGET', bucket_key, 'tokens'))
local last_refill = tonumber(redis.call('HGET', bucket_key, 'last_refill'))

if tokens == nil then
    tokens = capacity
    last_refill = now
end

local elapsed = math.max(0, now - last_refill)
tokens = math.min(capacity, tokens + elapsed * refill_rate)

if tokens >= 1 then
    tokens = tokens - 1
    redis.call('HSET', bucket_key, 'tokens', tokens, 'last_refill', now)
    redis.call('EXPIRE', bucket_key, 3600)
    return {1, tostring(tokens)}
else
    redis.call('HSET', bucket_key, 'tokens', tokens, 'last_refill', now)
    redis.call('EXPIRE', bucket_key, 3600)
    return {0, tostring(tokens)}
end
"#;

/// Index/heartbeat cleanup for single-use admission token issuance
/// (C6.3 Enter, invariant I5).
///
/// Atomically removes the waiter from both position-index keys and
/// drops its heartbeat — all three keys share the `{event_id}` hash tag,
/// so this stays a single-slot operation on a clustered store. The
/// reservation record itself is written separately under its own
/// `{reservation_token}` tag, as a plain `SET`, since it touches only
/// one key and needs no script.
///
/// KEYS: [position_index_key, legacy_index_key, heartbeat_key]
/// ARGV: [token]
/// Returns: {1, "released"}
const RELEASE_ATOMIC: &str = r#"
local position_index_key = KEYS[1]
local legacy_index_key = KEYS[2]
local heartbeat_key = KEYS[3]
local token = ARGV[1]

redis.call('ZREM', position_index_key, token)
redis.call('ZREM', legacy_index_key, token)
redis.call('DEL', heartbeat_key)

return {1, "released"}
"#;

pub struct ScriptRunner {
    enqueue: Script,
    admit: Script,
    release: Script,
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptRunner {
    pub fn new() -> Self {
        Self {
            enqueue: Script::new(ENQUEUE_ATOMIC),
            admit: Script::new(ADMIT_ATOMIC),
            release: Script::new(RELEASE_ATOMIC),
        }
    }

    pub async fn enqueue<C>(
        &self,
        conn: &mut C,
        dedupe_key: &str,
        log_key: &str,
        token: &str,
        event_id: &str,
        user_id: &str,
        dedupe_ttl_secs: u64,
    ) -> Result<ScriptOutcome, AppError>
    where
        C: ConnectionLike + Send,
    {
        let raw: RedisResult<Vec<redis::Value>> = self
            .enqueue
            .key(dedupe_key)
            .key(log_key)
            .arg(token)
            .arg(event_id)
            .arg(user_id)
            .arg(dedupe_ttl_secs)
            .invoke_async(conn)
            .await;
        ScriptOutcome::from_redis(raw?)
    }

    pub async fn admit<C>(
        &self,
        conn: &mut C,
        bucket_key: &str,
        capacity: f64,
        refill_rate: f64,
        now_epoch_secs: f64,
    ) -> Result<ScriptOutcome, AppError>
    where
        C: ConnectionLike + Send,
    {
        let raw: RedisResult<Vec<redis::Value>> = self
            .admit
            .key(bucket_key)
            .arg(capacity)
            .arg(refill_rate)
            .arg(now_epoch_secs)
            .invoke_async(conn)
            .await;
        ScriptOutcome::from_redis(raw?)
    }

    pub async fn release<C>(
        &self,
        conn: &mut C,
        position_index_key: &str,
        legacy_index_key: &str,
        heartbeat_key: &str,
        token: &str,
    ) -> Result<ScriptOutcome, AppError>
    where
        C: ConnectionLike + Send,
    {
        let raw: RedisResult<Vec<redis::Value>> = self
            .release
            .key(position_index_key)
            .key(legacy_index_key)
            .key(heartbeat_key)
            .arg(token)
            .invoke_async(conn)
            .await;
        ScriptOutcome::from_redis(raw?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_success_tuple() {
        let raw = vec![redis::Value::Int(1), redis::Value::Data(b"42-0".to_vec())];
        let outcome = ScriptOutcome::from_redis(raw).unwrap();
        assert!(outcome.ok);
        assert_eq!(outcome.data, "42-0");
    }

    #[test]
    fn parses_logical_error_tuple() {
        let raw = vec![
            redis::Value::Int(0),
            redis::Value::Data(b"DUPLICATE".to_vec()),
        ];
        let outcome = ScriptOutcome::from_redis(raw).unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.data, "DUPLICATE");
    }

    #[test]
    fn rejects_wrong_arity() {
        let raw = vec![redis::Value::Int(1)];
        assert!(ScriptOutcome::from_redis(raw).is_err());
    }

    #[test]
    fn rejects_unexpected_status_type() {
        let raw = vec![
            redis::Value::Data(b"not-a-status".to_vec()),
            redis::Value::Data(b"x".to_vec()),
        ];
        assert!(ScriptOutcome::from_redis(raw).is_err());
    }
}
