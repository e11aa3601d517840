//! Store key schema.
//!
//! Every multi-key operation uses the `{event_id}` brace (hash-tag)
//! convention so a partitioned/clustered store routes co-resident keys to
//! a single shard.

pub fn waiting_session(token: &str) -> String {
    format!("queue:waiting:{{{token}}}")
}

pub fn position_index(event_id: &str) -> String {
    format!("position_index:{{{event_id}}}")
}

/// Legacy alias kept alongside `position_index` — both names point at
/// the same sorted set.
pub fn legacy_position_index(event_id: &str) -> String {
    format!("queue:event:{{{event_id}}}")
}

pub fn per_user_log(event_id: &str, user_id: &str) -> String {
    format!("stream:event:{{{event_id}}}:user:{user_id}")
}

/// Tagged by `event_id`, not `token`, so the release script can clear a
/// waiter's heartbeat in the same hash slot as the position-index keys
/// it also touches.
pub fn heartbeat(event_id: &str, token: &str) -> String {
    format!("heartbeat:{{{event_id}}}:{token}")
}

pub fn dedupe(event_id: &str, idempotency_key: &str) -> String {
    format!("dedupe:{{{event_id}}}:{idempotency_key}")
}

pub fn admission_bucket(event_id: &str) -> String {
    format!("admission:bucket:{{{event_id}}}")
}

pub fn admission_metrics(event_id: &str) -> String {
    format!("metrics:admission:{{{event_id}}}")
}

pub fn reservation_token(token: &str) -> String {
    format!("queue:reservation:{{{token}}}")
}

pub fn idempotency_cache(uuid: &str) -> String {
    format!("idempotency:{{{uuid}}}")
}

pub fn principal_rate_bucket(principal: &str) -> String {
    format!("ratelimit:principal:{{{principal}}}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_share_event_hash_tag() {
        let event = "evt_A";
        assert!(position_index(event).contains("{evt_A}"));
        assert!(legacy_position_index(event).contains("{evt_A}"));
        assert!(per_user_log(event, "u1").contains("{evt_A}"));
        assert!(admission_bucket(event).contains("{evt_A}"));
        assert!(admission_metrics(event).contains("{evt_A}"));
        assert!(heartbeat(event, "tok_123").contains("{evt_A}"));
    }

    #[test]
    fn waiting_and_reservation_share_token_hash_tag() {
        let token = "tok_123";
        assert!(waiting_session(token).contains("{tok_123}"));
        assert!(reservation_token(token).contains("{tok_123}"));
    }
}
