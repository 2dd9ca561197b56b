//! API error mapping.
//!
//! Every handler returns `Result<_, ApiError>`; the taxonomy:
//! 400 for unmet state preconditions and bad uploads, 422 for models the
//! service understands enough to reject, 500 for everything internal.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use sysdyn_common::SdError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub detail: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    detail: &'a str,
}

impl ApiError {
    pub fn no_model() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "no_model",
            detail: "No model loaded".to_string(),
        }
    }

    pub fn no_results() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "no_results",
            detail: "No simulation results available".to_string(),
        }
    }

    pub fn bad_upload(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "bad_upload",
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "internal",
            detail: detail.into(),
        }
    }
}

impl From<SdError> for ApiError {
    fn from(err: SdError) -> Self {
        let (status, kind) = match &err {
            SdError::UnsupportedFormat(_) => (StatusCode::BAD_REQUEST, "unsupported_format"),
            SdError::Parse(_) | SdError::Xml(_) => (StatusCode::UNPROCESSABLE_ENTITY, "model_parse"),
            SdError::UnknownVariable { .. }
            | SdError::AlgebraicLoop(_)
            | SdError::InvalidSpecs(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_model"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        Self { status, kind, detail: err.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(kind = self.kind, detail = %self.detail, "request failed");
        }
        let body = ErrorBody { error: self.kind, detail: &self.detail };
        (self.status, Json(body)).into_response()
    }
}
