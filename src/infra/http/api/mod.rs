pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{
    Router,
    routing::{get, post},
};

pub fn build_api_router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/api/v1/snapshots",
            get(handlers::list_snapshots).post(handlers::create_snapshot),
        )
        .route("/api/v1/snapshots/{id}", get(handlers::get_snapshot))
        .route(
            "/api/v1/snapshots/{id}/transitions",
            post(handlers::transition_snapshot),
        )
        .route("/healthz", get(handlers::health))
        .with_state(state)
}
