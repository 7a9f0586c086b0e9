//! Health check endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "ok" or "degraded".
    pub status: String,
    pub service: String,
    pub version: String,
    /// Current timestamp (ISO 8601).
    pub timestamp: String,
    /// Hosted actor kinds.
    pub kinds: Vec<String>,
    /// Storage status, when a database is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/livez", get(livez))
}

/// Reports the hosted kinds and, on Postgres storage, whether the database
/// answers. Returns 503 when it does not.
async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let kinds = state
        .ingress()
        .kinds()
        .into_iter()
        .map(str::to_string)
        .collect();

    let (healthy, storage) = match state.db() {
        Some(db) => match db.health_check().await {
            Ok(()) => (true, Some("ok".to_string())),
            Err(e) => (false, Some(e.to_string())),
        },
        None => (true, None),
    };

    let response = HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        service: "silo".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        kinds,
        storage,
    };

    if healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

async fn livez() -> impl IntoResponse {
    StatusCode::OK
}
