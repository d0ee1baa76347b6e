//! Errors building decoder inputs from external artifacts.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid ABI JSON: {0}")]
    InvalidAbiJson(#[from] serde_json::Error),

    #[error("invalid compiler version '{version}': {source}")]
    InvalidCompilerVersion {
        version: String,
        #[source]
        source: semver::Error,
    },

    #[error("invalid hex bytecode: {0}")]
    InvalidBytecode(#[from] hex::FromHexError),
}
