//! Token-Bucket Admitter (C4).
//!
//! Per-event rate limiter deciding whether a waiter may be released
//! right now. Bucket state lives in the store hash at
//! `admission:bucket:{event_id}` and is advanced atomically by
//! `admit_atomic`.

use crate::error::AppError;
use crate::store::scripts::ScriptRunner;
use redis::aio::ConnectionManager;

const BUCKET_CAPACITY: f64 = 100.0;
const REFILL_PER_SEC: f64 = 10.0;

pub struct TokenBucketAdmitter {
    conn: ConnectionManager,
    scripts: std::sync::Arc<ScriptRunner>,
}

impl TokenBucketAdmitter {
    pub fn new(conn: ConnectionManager, scripts: std::sync::Arc<ScriptRunner>) -> Self {
        Self { conn, scripts }
    }

    /// Attempt to consume one admission token for `event_id`. Returns
    /// `true` if the waiter may proceed now.
    pub async fn try_admit(&mut self, event_id: &str, now_epoch_secs: f64) -> Result<bool, AppError> {
        let bucket_key = crate::store::keys::admission_bucket(event_id);
        let outcome = self
            .scripts
            .admit(
                &mut self.conn,
                &bucket_key,
                BUCKET_CAPACITY,
                REFILL_PER_SEC,
                now_epoch_secs,
            )
            .await?;
        Ok(outcome.ok)
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn bucket_parameters_are_fixed() {
        assert_eq!(super::BUCKET_CAPACITY, 100.0);
        assert_eq!(super::REFILL_PER_SEC, 10.0);
    }
}
