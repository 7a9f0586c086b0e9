//! API v1 routes.

mod actors;

pub use actors::{ActorsResponse, CompleteResponse, HistoryResponse, InvokeResponse};

use axum::Router;

use crate::state::AppState;

/// Create API v1 routes.
pub fn routes() -> Router<AppState> {
    Router::new().merge(actors::routes())
}
