use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use conduit_common::{CoreError, ErrorCode};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

fn code_str(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::InvalidArgument => "invalid_argument",
        ErrorCode::Unavailable => "unavailable",
        ErrorCode::Conflict => "conflict",
        ErrorCode::Corruption => "corruption",
        ErrorCode::Unauthorized => "unauthorized",
        ErrorCode::NotFound => "not_found",
        ErrorCode::Internal => "internal",
    }
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Corruption => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Wraps `CoreError` so handlers can return it directly via `?`.
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError(CoreError::Transient(err.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        if matches!(code, ErrorCode::Corruption) {
            tracing::error!(error = %self.0, "data corruption invariant violated");
        } else {
            tracing::warn!(error = %self.0, code = code_str(code), "request failed");
        }
        let body = ErrorBody {
            code: code_str(code),
            message: self.0.to_string(),
        };
        (status_for(code), Json(body)).into_response()
    }
}
