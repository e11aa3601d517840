pub mod auth;
pub mod health;
pub mod payment;
pub mod queue;
pub mod reservations;

use crate::state::AppState;
use axum::routing::{delete, get, post};
use axum::Router;

/// Assembles the full router: resource groups are built independently
/// and merged into one, then given the shared state.
pub fn router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/version", get(health::version))
        .route("/metrics", get(health::metrics));

    let queue_routes = Router::new()
        .route("/api/v1/queue/join", post(queue::join))
        .route("/api/v1/queue/status", get(queue::status))
        .route("/api/v1/queue/enter", post(queue::enter))
        .route("/api/v1/queue/leave", delete(queue::leave));

    let reservation_routes = Router::new()
        .route("/api/v1/reservations", post(reservations::create_reservation))
        .route("/api/v1/reservations/:id", get(reservations::get_reservation))
        .route(
            "/api/v1/reservations/:id/confirm",
            post(reservations::confirm_reservation),
        )
        .route(
            "/api/v1/reservations/:id/cancel",
            post(reservations::cancel_reservation),
        );

    let payment_routes = Router::new()
        .route("/api/v1/payment/intent", post(payment::create_intent))
        .route("/api/v1/payment/:id/status", get(payment::get_status));

    let auth_routes = Router::new()
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/register", post(auth::register));

    health_routes
        .merge(queue_routes)
        .merge(reservation_routes)
        .merge(payment_routes)
        .merge(auth_routes)
        .with_state(state)
}
