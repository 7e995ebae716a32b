//! Errors raised while constructing or parsing core types.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid feature id: {0}")]
    InvalidFeatureId(String),

    #[error("invalid hex payload: {0}")]
    InvalidHex(String),

    #[error("entropy source unavailable: {0}")]
    Entropy(String),
}
