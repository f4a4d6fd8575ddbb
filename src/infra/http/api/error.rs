use crate::application::error::ErrorReport;
use crate::application::snapshots::{ErrorKind, SnapshotServiceError};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    report: ErrorReport,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<SnapshotServiceError> for ApiError {
    fn from(err: SnapshotServiceError) -> Self {
        let (status, message) = match err.kind() {
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, "Resource not found"),
            ErrorKind::Conflict => (StatusCode::CONFLICT, "Snapshot conflict"),
            ErrorKind::Invalid => (StatusCode::BAD_REQUEST, "Invalid request"),
            ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
        };
        // Internal causes stay in the log report only.
        let hint = match err.kind() {
            ErrorKind::Internal => None,
            _ => Some(err.to_string()),
        };
        let report = ErrorReport::from_error(err.operation(), status, &err);
        Self {
            status,
            code: err.code(),
            message,
            hint,
            report,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}
