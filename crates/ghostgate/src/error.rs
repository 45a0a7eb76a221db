use thiserror::Error;

use crate::config::ConfigError;

/// Errors returned by GhostGate operations.
///
/// Verification and telemetry failures never show up here: they become a
/// deny decision or a `false` respectively.
#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("signature error: {0}")]
    SignatureError(String),

    #[error("http error: {0}")]
    HttpError(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
