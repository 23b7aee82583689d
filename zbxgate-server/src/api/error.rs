use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::json_response;

/// Error body returned by every route: `{"i18n_key", "message"}`
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    i18n_key: &'a str,
    message: &'a str,
}

/// A failed request, already mapped to its HTTP status
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    i18n_key: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, i18n_key: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            i18n_key,
            message: message.into(),
        }
    }

    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "error.invalid_query", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "error.forbidden", message)
    }

    pub fn read_only() -> Self {
        Self::new(StatusCode::FORBIDDEN, "error.read_only", "read-only mode")
    }

    pub fn not_found(path: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "error.not_found", format!("no route for {path}"))
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "error.unavailable", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        json_response(
            self.status,
            &ErrorBody {
                i18n_key: self.i18n_key,
                message: &self.message,
            },
        )
    }
}

impl From<zbxgate_common::Error> for ApiError {
    fn from(err: zbxgate_common::Error) -> Self {
        let status = if err.is_upstream() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::BAD_REQUEST
        };
        Self::new(status, err.i18n_key(), err.to_string())
    }
}
