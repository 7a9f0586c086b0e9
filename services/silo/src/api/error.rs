use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chronicle_engine::{ErrorKind, IngressError};
use serde::{Deserialize, Serialize};

/// RFC 7807 problem document.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    pub code: String,
    pub request_id: String,
    pub retryable: bool,
}

impl ProblemDetails {
    fn new(status: StatusCode, code: impl Into<String>, detail: impl Into<String>) -> Self {
        let code = code.into();
        let title = status
            .canonical_reason()
            .unwrap_or("Unknown Error")
            .to_string();
        Self {
            r#type: format!("https://chronicle.dev/problems/{code}"),
            title,
            status: status.as_u16(),
            detail: detail.into(),
            instance: None,
            code,
            request_id: "unknown".to_string(),
            retryable: false,
        }
    }

    fn set_request_id(&mut self, request_id: impl Into<String>) {
        let request_id = request_id.into();
        self.request_id = request_id.clone();
        if self.instance.is_none() {
            self.instance = Some(request_id);
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub problem: Box<ProblemDetails>,
}

impl ApiError {
    fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        let problem = Box::new(ProblemDetails::new(status, code, message));
        Self { status, problem }
    }

    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    /// Maps an engine error class onto a status and stable code.
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let status = match kind {
            ErrorKind::Format | ErrorKind::Arguments => StatusCode::BAD_REQUEST,
            ErrorKind::Rejected => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::UnknownType => StatusCode::NOT_FOUND,
            ErrorKind::Storage | ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Consistency => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Reentrancy => StatusCode::CONFLICT,
        };
        let mut err = Self::new(status, kind.code(), message);
        err.problem.retryable = kind.is_retryable();
        err
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.problem.set_request_id(request_id);
        self
    }
}

impl From<IngressError> for ApiError {
    fn from(err: IngressError) -> Self {
        Self::from_kind(err.kind(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.problem)).into_response();
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::Rejected, StatusCode::UNPROCESSABLE_ENTITY, false)]
    #[case(ErrorKind::UnknownType, StatusCode::NOT_FOUND, false)]
    #[case(ErrorKind::Arguments, StatusCode::BAD_REQUEST, false)]
    #[case(ErrorKind::Storage, StatusCode::SERVICE_UNAVAILABLE, true)]
    #[case(ErrorKind::Consistency, StatusCode::INTERNAL_SERVER_ERROR, true)]
    #[case(ErrorKind::Reentrancy, StatusCode::CONFLICT, false)]
    fn test_status_mapping(
        #[case] kind: ErrorKind,
        #[case] status: StatusCode,
        #[case] retryable: bool,
    ) {
        let err = ApiError::from_kind(kind, "boom");
        assert_eq!(err.status, status);
        assert_eq!(err.problem.code, kind.code());
        assert_eq!(err.problem.retryable, retryable);
    }

    #[test]
    fn test_request_id_fills_instance() {
        let err = ApiError::bad_request("format_error", "bad").with_request_id("req-1");
        assert_eq!(err.problem.request_id, "req-1");
        assert_eq!(err.problem.instance.as_deref(), Some("req-1"));
    }
}
