use axum::extract::rejection::FormRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::errors::RelayError;
use crate::middleware::RequestSpan;

pub type AppResult<T> = Result<T, AppError>;

/// Handler error rendered as a plain-text response.
#[derive(Debug, Clone)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new<M: Into<String>>(status: StatusCode, message: M) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request<M: Into<String>>(message: M) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

impl From<RelayError> for AppError {
    fn from(err: RelayError) -> Self {
        let status = match err {
            RelayError::ProductNotFound(_) => StatusCode::NOT_FOUND,
            RelayError::ProductExists(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, err.to_string())
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

/// Converts an error and records it on the request span.
pub fn on_span<E>(span: &RequestSpan) -> impl Fn(E) -> AppError + '_
where
    E: Into<AppError>,
{
    move |err| {
        let err = err.into();
        span.record_error(&err.message);
        err
    }
}
