use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::usecases::{orders::OrderError, payments::PaymentError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Forbidden")]
    Forbidden,

    #[error("{message}")]
    Client { status: StatusCode, message: String },

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Client {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    fn from_rejection(status: StatusCode, message: String) -> Self {
        let source = anyhow::anyhow!(message.clone());
        AppError::from_status(status, message, source)
    }

    fn from_status(status: StatusCode, message: String, source: anyhow::Error) -> Self {
        if status.is_server_error() {
            AppError::Internal(source)
        } else {
            AppError::Client { status, message }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        let status = err.status_code();
        let message = err.to_string();
        AppError::from_status(status, message, anyhow::Error::new(err))
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        let status = err.status_code();
        let message = err.to_string();
        AppError::from_status(status, message, anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::Client { status, message } => (status, message),
            AppError::Internal(_) => {
                // Don't leak internal error detail to client
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            message,
        });

        (status, body).into_response()
    }
}
