use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::compose::ComposeError;

/// Errors surfaced by HTTP handlers. Each maps to a status code and a
/// `{ "error": ..., "details": ... }` body.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid request body")]
    BadRequest { status: StatusCode, details: String },

    #[error("invalid image data")]
    InvalidImage(String),

    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("the answer service timed out")]
    ProviderTimeout(String),

    #[error("the answer service failed")]
    Provider(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("not found")]
    NotFound,
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest { status, .. } => *status,
            AppError::InvalidImage(_) | AppError::EmptyQuestion => StatusCode::BAD_REQUEST,
            AppError::ProviderTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Provider(_) => StatusCode::BAD_GATEWAY,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::NotFound => StatusCode::NOT_FOUND,
        }
    }

    fn details(&self) -> Option<&str> {
        match self {
            AppError::BadRequest { details: d, .. }
            | AppError::InvalidImage(d)
            | AppError::ProviderTimeout(d)
            | AppError::Provider(d) => Some(d),
            AppError::EmptyQuestion | AppError::MethodNotAllowed | AppError::NotFound => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody { error: self.to_string(), details: self.details() };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        // missing or mistyped fields are a client error like any other bad body
        let status = match err.status() {
            StatusCode::UNPROCESSABLE_ENTITY => StatusCode::BAD_REQUEST,
            other => other,
        };
        AppError::BadRequest { status, details: err.body_text() }
    }
}

impl From<ComposeError> for AppError {
    fn from(err: ComposeError) -> Self {
        match err {
            ComposeError::EmptyQuestion => AppError::EmptyQuestion,
            ComposeError::Provider(e) => {
                tracing::error!(error = %e, "completion provider failed");
                if e.is_timeout() {
                    AppError::ProviderTimeout(e.redacted())
                } else {
                    AppError::Provider(e.redacted())
                }
            }
        }
    }
}
