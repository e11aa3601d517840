//! Sliding-Window Estimator (C3).
//!
//! Admission events are recorded as scored entries (score = epoch
//! seconds) in a per-event sorted set so the three windows can be read
//! back with a single `ZCOUNT` each.

use crate::error::AppError;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

const W1_SECS: i64 = 60;
const W2_SECS: i64 = 300;
const W3_SECS: i64 = 900;

/// Admission events older than the largest window are useless for the
/// estimate but are kept around briefly for observability; trimmed on
/// every record to bound the set's size.
const RETENTION_SECS: i64 = W3_SECS + 60;

const ETA_MIN_SECS: u32 = 1;
const ETA_MAX_SECS: u32 = 600;

/// Hour-of-day throughput multiplier, indexed 0..24 (UTC hour).
/// Overnight hours run low traffic, business hours peak near 2x.
const HOUR_OF_DAY_MULTIPLIER: [f64; 24] = [
    0.3, 0.2, 0.2, 0.2, 0.3, 0.4, // 00-05
    0.6, 0.8, 1.0, 1.2, 1.4, 1.6, // 06-11
    1.8, 2.0, 1.8, 1.6, 1.4, 1.3, // 12-17
    1.5, 1.7, 1.6, 1.2, 0.9, 0.6, // 18-23
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub eta_seconds: u32,
    pub confidence: f64,
}

pub struct SlidingWindowEstimator {
    conn: ConnectionManager,
}

impl SlidingWindowEstimator {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Record a successful admission at `now` (epoch seconds).
    pub async fn record_admission(&mut self, event_id: &str, now: i64) -> Result<(), AppError> {
        let key = crate::store::keys::admission_metrics(event_id);
        self.conn.zadd::<_, _, _, ()>(&key, now, now).await?;
        self.conn
            .zrembyscore::<_, _, _, ()>(&key, "-inf", now - RETENTION_SECS)
            .await?;
        self.conn.expire::<_, ()>(&key, RETENTION_SECS as i64).await?;
        Ok(())
    }

    /// Compute `(eta_seconds, confidence)` for a waiter at `position`,
    /// as of `now` (epoch seconds).
    pub async fn estimate(
        &mut self,
        event_id: &str,
        position: u64,
        now: i64,
    ) -> Result<Estimate, AppError> {
        let key = crate::store::keys::admission_metrics(event_id);
        let c1: u64 = self.conn.zcount(&key, now - W1_SECS, now).await?;
        let c2: u64 = self.conn.zcount(&key, now - W2_SECS, now).await?;
        let c3: u64 = self.conn.zcount(&key, now - W3_SECS, now).await?;

        Ok(compute_estimate(position, c1, c2, c3, now))
    }
}

/// Pure function over window counts so the algorithm is unit-testable
/// without a store connection.
pub fn compute_estimate(position: u64, c1: u64, c2: u64, c3: u64, now_epoch_secs: i64) -> Estimate {
    let r1 = c1 as f64 / W1_SECS as f64;
    let r2 = c2 as f64 / W2_SECS as f64;
    let r3 = c3 as f64 / W3_SECS as f64;

    // Each window "has data" once at least one admission falls inside it.
    let (w1, w2, w3) = (c1 > 0, c2 > 0, c3 > 0);
    let weight_sum = [w1, w2, w3]
        .iter()
        .zip([0.5, 0.3, 0.2])
        .filter(|(has, _)| **has)
        .map(|(_, w)| w)
        .sum::<f64>();

    let r = if weight_sum > 0.0 {
        (if w1 { 0.5 * r1 } else { 0.0 }
            + if w2 { 0.3 * r2 } else { 0.0 }
            + if w3 { 0.2 * r3 } else { 0.0 })
            / weight_sum
    } else {
        0.0
    };

    let h = hour_of_day_multiplier(now_epoch_secs);
    let r_prime = h * r;

    let eta_seconds = if r_prime > 0.0 {
        let eta = (position as f64 / r_prime * 1.1).ceil() as i64;
        eta.clamp(ETA_MIN_SECS as i64, ETA_MAX_SECS as i64) as u32
    } else {
        (2 * position).min(ETA_MAX_SECS as u64) as u32
    };

    let confidence = if c3 >= 30 {
        1.0
    } else if c2 >= 10 {
        0.8
    } else if c1 >= 3 {
        0.6
    } else {
        0.2
    };

    Estimate {
        eta_seconds,
        confidence,
    }
}

fn hour_of_day_multiplier(now_epoch_secs: i64) -> f64 {
    let hour = ((now_epoch_secs.div_euclid(3600)) % 24).rem_euclid(24) as usize;
    HOUR_OF_DAY_MULTIPLIER[hour]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cold_start_falls_back_to_twice_position() {
        let est = compute_estimate(5, 0, 0, 0, 0);
        assert_eq!(est.eta_seconds, 10);
        assert_eq!(est.confidence, 0.2);
    }

    #[test]
    fn cold_start_clamps_at_max() {
        let est = compute_estimate(1000, 0, 0, 0, 0);
        assert_eq!(est.eta_seconds, 600);
    }

    #[test]
    fn warm_state_blends_all_three_windows() {
        // hour 8 maps to a 1.0 multiplier in our table. 30 admissions in
        // the last 60s are necessarily also within W2/W3 (nested
        // look-back windows), so all three rates contribute to the blend
        // rather than only the freshest one.
        let now = 8 * 3600;
        let est = compute_estimate(5, 30, 30, 30, now);
        assert_eq!(est.eta_seconds, 20);
        assert_eq!(est.confidence, 1.0);
    }

    #[test]
    fn confidence_tiers() {
        assert_eq!(compute_estimate(5, 0, 0, 0, 8 * 3600).confidence, 0.2);
        assert_eq!(compute_estimate(5, 3, 3, 3, 8 * 3600).confidence, 0.6);
        assert_eq!(compute_estimate(5, 10, 10, 10, 8 * 3600).confidence, 0.8);
        assert_eq!(compute_estimate(5, 30, 30, 30, 8 * 3600).confidence, 1.0);
    }

    #[test]
    fn single_window_renormalizes_instead_of_diluting() {
        // Only W1 has data: weight should renormalize to 1.0 for r1 alone.
        let est_single = compute_estimate(10, 6, 0, 0, 8 * 3600);
        // r1 = 6/60 = 0.1, h=1.0 -> eta = ceil(10/0.1*1.1) = 110
        assert_eq!(est_single.eta_seconds, 110);
    }

    #[test]
    fn eta_never_below_minimum() {
        let est = compute_estimate(1, 10_000, 10_000, 10_000, 8 * 3600);
        assert!(est.eta_seconds >= ETA_MIN_SECS);
    }
}
