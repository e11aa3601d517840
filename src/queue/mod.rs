pub mod admitter;
pub mod estimator;
pub mod heartbeat;
pub mod orchestrator;

pub use admitter::TokenBucketAdmitter;
pub use estimator::SlidingWindowEstimator;
pub use orchestrator::{EnterResult, JoinResult, LeaveResult, QueueOrchestrator, StatusResult};
