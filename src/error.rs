//! Errors raised by the optional nuance-analysis layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NuanceError {
    #[error("could not read nuance response: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed nuance response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown flag type {0:?}")]
    UnknownFlagType(String),

    #[error("nuance flag is missing a reason")]
    MissingReason,
}

pub type Result<T, E = NuanceError> = std::result::Result<T, E>;
