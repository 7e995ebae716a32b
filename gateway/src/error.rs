use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("encryption service not initialized")]
    NotInitialized,

    #[error("plaintext {value} outside supported range 0..={max}")]
    OutOfRange { value: u64, max: u64 },

    #[error("user rejected transaction")]
    UserRejected,

    #[error("data already verified")]
    AlreadyVerified,

    #[error("record {0} not found")]
    NotFound(String),

    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Map a provider or revert message onto a typed error.
    ///
    /// Wallets and contracts report these conditions as free text; matching
    /// happens here once so callers only ever inspect variants.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("user rejected") || lower.contains("user denied") {
            Self::UserRejected
        } else if lower.contains("already verified") {
            Self::AlreadyVerified
        } else {
            Self::Reverted(message)
        }
    }

    /// Whether the failure means another party already committed the verification.
    pub fn is_already_verified(&self) -> bool {
        matches!(self, Self::AlreadyVerified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_user_rejection() {
        assert_eq!(
            GatewayError::classify("MetaMask Tx Signature: User rejected transaction"),
            GatewayError::UserRejected
        );
        assert_eq!(
            GatewayError::classify("User denied transaction signature"),
            GatewayError::UserRejected
        );
    }

    #[test]
    fn classify_already_verified() {
        let err = GatewayError::classify("execution reverted: Data already verified");
        assert!(err.is_already_verified());
    }

    #[test]
    fn classify_falls_back_to_reverted() {
        assert_eq!(
            GatewayError::classify("execution reverted: Invalid proof"),
            GatewayError::Reverted("execution reverted: Invalid proof".into())
        );
    }
}
