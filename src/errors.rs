//! Error handling for the access arbiter
//!
//! Every failure names the pipeline stage it came from so that an operator
//! can tell a bad request apart from a collaborator outage or a broken model
//! bundle without reading logs.

use crate::attribute_inferencer::InferredAttributes;
use thiserror::Error;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Request,
    Inference,
    Features,
    ApprovalModel,
    AnomalyGate,
    Bundle,
    Config,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Request => "request",
            Stage::Inference => "inference",
            Stage::Features => "features",
            Stage::ApprovalModel => "approval_model",
            Stage::AnomalyGate => "anomaly_gate",
            Stage::Bundle => "bundle",
            Stage::Config => "config",
        };
        f.write_str(name)
    }
}

/// Main error type for the arbiter
#[derive(Error, Debug)]
pub enum ArbiterError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// The text-classification collaborator failed or answered with
    /// something unparseable. Carries the sentinel attribute set.
    #[error("Attribute inference failed: {message}")]
    Inference {
        message: String,
        sentinel: Box<InferredAttributes>,
    },

    #[error("Feature shape mismatch: {column} - {message}")]
    FeatureShape { column: String, message: String },

    #[error("Model evaluation failed ({stage}): {message}")]
    Model { stage: Stage, message: String },

    #[error("Model bundle error: {path} - {message}")]
    Bundle { path: String, message: String },

    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Network operation failed: {operation}")]
    Network {
        operation: String,
        #[source]
        source: reqwest::Error,
    },
}

pub type ArbiterResult<T> = Result<T, ArbiterError>;

impl ArbiterError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn inference(message: impl Into<String>, sentinel: InferredAttributes) -> Self {
        Self::Inference {
            message: message.into(),
            sentinel: Box::new(sentinel),
        }
    }

    pub fn feature_shape(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FeatureShape {
            column: column.into(),
            message: message.into(),
        }
    }

    pub fn model(stage: Stage, message: impl Into<String>) -> Self {
        Self::Model {
            stage,
            message: message.into(),
        }
    }

    pub fn bundle(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Bundle {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn network(operation: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            operation: operation.into(),
            source,
        }
    }

    /// Stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            ArbiterError::Config { .. } => Stage::Config,
            ArbiterError::Validation { .. } | ArbiterError::Serialization { .. } => Stage::Request,
            ArbiterError::Inference { .. } | ArbiterError::Network { .. } => Stage::Inference,
            ArbiterError::FeatureShape { .. } => Stage::Features,
            ArbiterError::Model { stage, .. } => *stage,
            ArbiterError::Bundle { .. } | ArbiterError::Io { .. } => Stage::Bundle,
        }
    }

    /// Client input errors are the only ones a caller can fix by resending.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ArbiterError::Validation { .. } | ArbiterError::Serialization { .. }
        )
    }
}

impl From<serde_json::Error> for ArbiterError {
    fn from(err: serde_json::Error) -> Self {
        ArbiterError::serialization("json_operation", err)
    }
}

impl From<std::io::Error> for ArbiterError {
    fn from(err: std::io::Error) -> Self {
        ArbiterError::io("io_operation", err)
    }
}

impl From<reqwest::Error> for ArbiterError {
    fn from(err: reqwest::Error) -> Self {
        ArbiterError::network("http_request", err)
    }
}

impl From<figment::Error> for ArbiterError {
    fn from(err: figment::Error) -> Self {
        ArbiterError::config(err.to_string())
    }
}
