//! Request-scoped context extracted from HTTP requests.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chronicle_id::{CorrelationId, Uuid, UserId};

use crate::api::error::ApiError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    /// Used for commands whose body carries no `cid`.
    pub correlation_id: Option<CorrelationId>,
    /// Used for commands whose body carries no `uid`.
    pub user_id: Option<UserId>,
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = header_string(&parts.headers, REQUEST_ID_HEADER)
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

        let correlation_id = match header_string(&parts.headers, CORRELATION_ID_HEADER) {
            Some(raw) => Some(raw.parse::<CorrelationId>().map_err(|e| {
                ApiError::bad_request("format_error", format!("invalid {CORRELATION_ID_HEADER}: {e}"))
                    .with_request_id(request_id.clone())
            })?),
            None => None,
        };

        let user_id = match header_string(&parts.headers, USER_ID_HEADER) {
            Some(raw) => Some(raw.parse::<UserId>().map_err(|e| {
                ApiError::bad_request("format_error", format!("invalid {USER_ID_HEADER}: {e}"))
                    .with_request_id(request_id.clone())
            })?),
            None => None,
        };

        Ok(Self {
            request_id,
            correlation_id,
            user_id,
        })
    }
}
