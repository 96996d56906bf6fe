//! Rally — API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rally_core::error::{EngineError, Rejection};
use serde::Serialize;
use thiserror::Error;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migrations could not be applied.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// The engine could not be configured.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer wrapper around engine outcomes that did not succeed.
#[derive(Debug)]
pub enum ApiError {
    /// The engine decided nothing should change.
    Rejected(Rejection),
    /// The engine failed.
    Engine(EngineError),
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected(rejection)
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

fn rejection_status(rejection: &Rejection) -> StatusCode {
    match rejection {
        Rejection::InvalidAmount
        | Rejection::UnknownCommunity { .. }
        | Rejection::UnknownEvent { .. }
        | Rejection::UnknownAction { .. }
        | Rejection::UnsupportedOperation { .. }
        | Rejection::QuestNotFound { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::CONFLICT,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            Self::Rejected(rejection) => {
                (rejection_status(rejection), rejection.code(), rejection.to_string())
            }
            Self::Engine(err) => {
                let (status, code) = match err {
                    EngineError::Transient(_) => (StatusCode::SERVICE_UNAVAILABLE, "transient_error"),
                    EngineError::Configuration(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error")
                    }
                    EngineError::Invariant(_) => (StatusCode::CONFLICT, "invariant_violation"),
                    EngineError::Infrastructure(_) | EngineError::Serialization(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "infrastructure_error")
                    }
                };
                (status, code, err.to_string())
            }
        };

        let body = ErrorBody {
            error: error_code,
            message,
        };

        (status, Json(body)).into_response()
    }
}
