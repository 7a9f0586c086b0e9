//! HTTP API handlers and routing.

pub mod error;
mod health;
mod request_context;
pub mod v1;

pub use health::HealthResponse;

use axum::{http::HeaderName, Router};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Create the main API router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(request_context::REQUEST_ID_HEADER);

    Router::new()
        .merge(health::routes())
        .nest("/v1", v1::routes())
        // Layers run bottom-up: the id is set before tracing sees the request.
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .with_state(state)
}
