//! Structured logging bootstrap.
//!
//! Mirrors this codebase's sibling `logging.rs`: `tracing_subscriber`
//! registry with an env filter and a JSON-formatted layer, minus the
//! hand-rolled Logstash TCP writer (no downstream log collector is part
//! of this system's scope).

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub fn init(environment: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if environment == "development" {
            EnvFilter::new("info,waitingroom_backend=debug")
        } else {
            EnvFilter::new("info")
        }
    });

    let registry = tracing_subscriber::registry().with(filter);

    if environment == "development" {
        registry.with(fmt::layer().pretty()).init();
    } else {
        registry.with(fmt::layer().json()).init();
    }
}
