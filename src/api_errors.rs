use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::errors::{ArbiterError, Stage};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    BadRequest {
        stage: Stage,
        message: String,
        details: Option<serde_json::Value>,
    },
    #[error("{message}")]
    Internal {
        stage: Stage,
        message: String,
        details: Option<serde_json::Value>,
    },
}

impl AppError {
    pub fn bad_request(stage: Stage, msg: impl Into<String>) -> Self {
        Self::BadRequest {
            stage,
            message: msg.into(),
            details: None,
        }
    }

    pub fn internal(stage: Stage, msg: impl Into<String>) -> Self {
        Self::Internal {
            stage,
            message: msg.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, value: serde_json::Value) -> Self {
        match &mut self {
            AppError::BadRequest { details, .. } | AppError::Internal { details, .. } => {
                *details = Some(value)
            }
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrBody {
    error: String,
    stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.status();
        let (stage, message, details) = match self {
            AppError::BadRequest {
                stage,
                message,
                details,
            }
            | AppError::Internal {
                stage,
                message,
                details,
            } => (stage, message, details),
        };
        (
            code,
            Json(ErrBody {
                error: message,
                stage,
                details,
            }),
        )
            .into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request(Stage::Request, rejection.body_text())
    }
}

impl From<ArbiterError> for AppError {
    fn from(err: ArbiterError) -> Self {
        let stage = err.stage();
        if err.is_client_error() {
            warn!(%stage, error = %err, "request rejected");
            return AppError::bad_request(stage, err.to_string());
        }

        error!(%stage, error = %err, "request failed");
        match err {
            ArbiterError::Inference { message, sentinel } => AppError::internal(
                stage,
                format!("Attribute inference failed: {message}"),
            )
            .with_details(serde_json::json!({ "inferred_data": *sentinel })),
            other => AppError::internal(stage, other.to_string()),
        }
    }
}
