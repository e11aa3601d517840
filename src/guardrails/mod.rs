pub mod idempotency;
pub mod rate_limit;

pub use idempotency::{
    fingerprint, idempotency_middleware, is_valid_uuid_v4, IdempotencyCache, IdempotencyCheck,
};
pub use rate_limit::{rate_limit_middleware, PrincipalRateLimiter};
