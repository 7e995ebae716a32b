use std::time::Duration;

use fhevote_gateway::GatewayError;
use fhevote_types::TypeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("no identity connected")]
    IdentityNotConnected,

    #[error("encryption subsystem not initialized")]
    SubsystemNotInitialized,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("encryption failed: {0}")]
    EncryptionFailure(String),

    #[error("transaction rejected by user")]
    TransactionRejectedByUser,

    #[error("transaction failed: {0}")]
    TransactionFailure(String),

    #[error("decryption failed: {0}")]
    DecryptionFailure(String),

    #[error("failed to load records: {0}")]
    LoadFailure(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("no confirmation within {0:?}")]
    Timeout(Duration),

    #[error("config error: {0}")]
    Config(String),

    #[error("id generation failed: {0}")]
    Id(#[from] TypeError),
}

impl CoordinatorError {
    /// Map a failed create submission onto the error taxonomy.
    pub(crate) fn from_submission(err: GatewayError) -> Self {
        match err {
            GatewayError::UserRejected => Self::TransactionRejectedByUser,
            other => Self::TransactionFailure(other.to_string()),
        }
    }

    /// The text of the transient notification shown for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::IdentityNotConnected => "Please connect wallet first".to_string(),
            Self::SubsystemNotInitialized => "Encryption subsystem is not ready yet".to_string(),
            Self::InvalidInput(msg) => msg.clone(),
            Self::EncryptionFailure(msg) => format!("Encryption failed: {msg}"),
            Self::TransactionRejectedByUser => "Transaction rejected by user".to_string(),
            Self::TransactionFailure(msg) => format!("Submission failed: {msg}"),
            Self::DecryptionFailure(msg) => format!("Decryption failed: {msg}"),
            Self::LoadFailure(_) => "Failed to load data".to_string(),
            Self::Cancelled => "Operation cancelled".to_string(),
            Self::Timeout(_) => "Timed out waiting for confirmation".to_string(),
            Self::Config(msg) => format!("Configuration error: {msg}"),
            Self::Id(err) => format!("Submission failed: {err}"),
        }
    }
}
