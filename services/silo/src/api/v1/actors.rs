//! Command ingress and actor introspection endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chronicle_engine::{ActorDescription, EngineError, IngressError};
use chronicle_events::Event;
use chronicle_id::{Address, EventId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: i64 = 100;
const MAX_HISTORY_LIMIT: i64 = 1000;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/invoke", post(invoke))
        .route("/actors", get(list_actors))
        .route("/actors/{kind}/{id}/history", get(history))
        .route("/actors/{kind}/{id}/clear", post(clear))
        .route("/complete", get(complete))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub result: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActorsResponse {
    pub items: Vec<ActorDescription>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Return events with id > after.
    pub after: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub items: Vec<Event>,
    /// Pass as `after` to read the next page.
    pub next_after: i64,
}

#[derive(Debug, Deserialize)]
pub struct CompleteQuery {
    /// Complete method names of this kind; kind names when absent.
    pub kind: Option<String>,
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteResponse {
    pub items: Vec<String>,
}

/// Runs one wire command: `{"to": "kind/id", "type": "add", "args": [..]}`.
///
/// `cid` and `uid` fall back to the `x-correlation-id` and `x-user-id`
/// headers when the body has none.
async fn invoke(
    State(state): State<AppState>,
    ctx: RequestContext,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<InvokeResponse>, ApiError> {
    let request_id = ctx.request_id.clone();
    let Json(mut body) = body.map_err(|e| {
        ApiError::bad_request("format_error", e.body_text()).with_request_id(request_id.clone())
    })?;

    if let Some(fields) = body.as_object_mut() {
        if let Some(cid) = ctx.correlation_id {
            fields.entry("cid").or_insert_with(|| Value::String(cid.to_string()));
        }
        if let Some(uid) = ctx.user_id {
            fields.entry("uid").or_insert_with(|| Value::String(uid.to_string()));
        }
    }

    let command: Event = serde_json::from_value(body).map_err(|e| {
        ApiError::bad_request("format_error", format!("malformed command: {e}"))
            .with_request_id(request_id.clone())
    })?;
    debug!(to = ?command.to, event_type = %command.event_type, "invoke");

    let result = state
        .ingress()
        .invoke(&command)
        .await
        .map_err(|e| ApiError::from(e).with_request_id(request_id))?;
    Ok(Json(InvokeResponse { result }))
}

async fn list_actors(State(state): State<AppState>) -> Json<ActorsResponse> {
    Json(ActorsResponse {
        items: state.ingress().actors(),
    })
}

fn parse_address(kind: &str, id: &str, request_id: &str) -> Result<Address, ApiError> {
    Address::parse(&format!("{kind}/{id}")).map_err(|e| {
        ApiError::from(IngressError::from(EngineError::from(e))).with_request_id(request_id)
    })
}

async fn history(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((kind, id)): Path<(String, String)>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let address = parse_address(&kind, &id, &ctx.request_id)?;
    let after = EventId::new(query.after.unwrap_or(0).max(0));
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let items = state
        .ingress()
        .history(&address, after, limit)
        .await
        .map_err(|e| ApiError::from(e).with_request_id(ctx.request_id.clone()))?;
    let next_after = items.last().map(|e| e.id).unwrap_or(after).value();

    Ok(Json(HistoryResponse { items, next_after }))
}

async fn clear(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((kind, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let address = parse_address(&kind, &id, &ctx.request_id)?;
    state
        .ingress()
        .clear(&address)
        .await
        .map_err(|e| ApiError::from(e).with_request_id(ctx.request_id))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn complete(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<CompleteQuery>,
) -> Result<Json<CompleteResponse>, ApiError> {
    let items = match &query.kind {
        Some(kind) => state
            .ingress()
            .complete_method(kind, &query.prefix)
            .map_err(|e| ApiError::from(e).with_request_id(ctx.request_id))?,
        None => state.ingress().complete_kind(&query.prefix),
    };
    Ok(Json(CompleteResponse { items }))
}
