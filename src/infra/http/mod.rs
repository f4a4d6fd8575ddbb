pub mod api;
mod middleware;

pub use api::ApiState;
pub use middleware::{CORRELATION_ID_HEADER, RequestContext};

use axum::{Router, middleware as axum_middleware};

use middleware::{log_responses, set_request_context};

/// Full service router: snapshot API plus health, wrapped in request context and response logging.
pub fn build_router(state: ApiState) -> Router {
    api::build_api_router(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
