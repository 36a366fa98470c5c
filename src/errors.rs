use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::ConfigError;

/// HTTP-level failures of the upgrade endpoint.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("not implemented: {message}")]
    NotImplemented {
        code: &'static str,
        message: &'static str,
    },
    #[error("busy: {message}")]
    Busy {
        code: &'static str,
        message: &'static str,
    },
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl AppError {
    pub fn not_implemented(code: &'static str, message: &'static str) -> Self {
        Self::NotImplemented { code, message }
    }

    pub fn busy(code: &'static str, message: &'static str) -> Self {
        Self::Busy { code, message }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::NotImplemented { code, message } => {
                (StatusCode::NOT_IMPLEMENTED, code, message.to_string())
            }
            Self::Busy { code, message } => {
                (StatusCode::SERVICE_UNAVAILABLE, code, message.to_string())
            }
        };

        (
            status,
            Json(ErrorResponse {
                code: code.to_string(),
                message,
                details: json!({}),
            }),
        )
            .into_response()
    }
}

/// Failure reported by a module method.
///
/// Each variant maps onto one JSON-RPC error code when the server builds the
/// response envelope.
#[derive(Debug, Error)]
pub enum MethodError {
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("{message}")]
    Failed {
        message: String,
        data: Option<Value>,
    },
    #[error("server error {code}: {message}")]
    Server { code: i32, message: String },
    #[error("method panicked: {0}")]
    Panicked(String),
}

impl MethodError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams(message.into())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            data: None,
        }
    }

    pub fn failed_with_data(message: impl Into<String>, data: Value) -> Self {
        Self::Failed {
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn server(code: i32, message: impl Into<String>) -> Self {
        Self::Server {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] axum::Error),
}

/// Startup failures surfaced by the process entry point.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unknown module `{specifier}` (available: {available})")]
    UnknownModule {
        specifier: String,
        available: String,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
}
