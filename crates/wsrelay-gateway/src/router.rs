//! Axum router wiring: hub WebSocket upgrade plus ops endpoints.

use axum::{routing::get, Router};

use crate::{app_state::AppState, hub, ops};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(hub::ws::hub_upgrade))
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .with_state(state)
}
