//! Gated access to the encryption service.
//!
//! The service must be initialized once, by a connected identity, before any
//! encrypt or decrypt call. Initialization is single-flight: overlapping
//! callers await the same attempt, and a failed attempt leaves the service
//! uninitialized so it can be retried.

use std::sync::Arc;

use tokio::sync::OnceCell;

use fhevote_gateway::{
    DecryptionOutcome, EncryptedInput, EncryptionGateway, GatewayError, VerificationCommit,
};
use fhevote_types::{ContractAddress, EncryptedHandle, IdentityAddress};

use crate::CoordinatorError;

pub struct EncryptionService {
    gateway: Arc<dyn EncryptionGateway>,
    ready: OnceCell<()>,
}

impl EncryptionService {
    pub fn new(gateway: Arc<dyn EncryptionGateway>) -> Self {
        Self {
            gateway,
            ready: OnceCell::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    /// Initialize the service on behalf of `identity`.
    pub async fn initialize(
        &self,
        identity: Option<&IdentityAddress>,
    ) -> Result<(), CoordinatorError> {
        let identity = identity.ok_or(CoordinatorError::IdentityNotConnected)?;
        self.ready
            .get_or_try_init(|| async {
                tracing::info!(service = self.gateway.name(), identity = %identity, "initializing encryption service");
                self.gateway.initialize().await.map_err(|e| {
                    tracing::error!(service = self.gateway.name(), error = %e, "encryption service initialization failed");
                    CoordinatorError::EncryptionFailure(e.to_string())
                })
            })
            .await?;
        Ok(())
    }

    pub async fn encrypt(
        &self,
        contract: &ContractAddress,
        identity: &IdentityAddress,
        plaintext: u64,
    ) -> Result<EncryptedInput, CoordinatorError> {
        if !self.is_ready() {
            return Err(CoordinatorError::SubsystemNotInitialized);
        }
        self.gateway
            .encrypt(contract, identity, plaintext)
            .await
            .map_err(|e| CoordinatorError::EncryptionFailure(e.to_string()))
    }

    /// Decrypt `handles` and commit the result through `commit`.
    ///
    /// Gateway errors are returned untouched; the caller decides which of
    /// them are recoverable.
    pub async fn request_decryption(
        &self,
        handles: &[EncryptedHandle],
        contract: &ContractAddress,
        commit: &dyn VerificationCommit,
    ) -> Result<DecryptionOutcome, GatewayError> {
        if !self.is_ready() {
            return Err(GatewayError::NotInitialized);
        }
        self.gateway
            .request_decryption(handles, contract, commit)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhevote_nullables::NullEncryption;
    use std::time::Duration;

    fn identity() -> IdentityAddress {
        IdentityAddress::from_bytes([0x22; 20])
    }

    fn contract() -> ContractAddress {
        ContractAddress::from_bytes([0xcc; 20])
    }

    #[tokio::test]
    async fn initialize_requires_identity() {
        let gateway = Arc::new(NullEncryption::new());
        let service = EncryptionService::new(gateway.clone());
        let err = service.initialize(None).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::IdentityNotConnected));
        assert_eq!(gateway.init_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_initialize_runs_once() {
        let gateway = Arc::new(NullEncryption::new());
        gateway.set_init_delay(Duration::from_millis(500));
        let service = EncryptionService::new(gateway.clone());
        let id = identity();

        let (a, b, c) = tokio::join!(
            service.initialize(Some(&id)),
            service.initialize(Some(&id)),
            service.initialize(Some(&id)),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(gateway.init_calls(), 1);
        assert!(service.is_ready());

        service.initialize(Some(&id)).await.unwrap();
        assert_eq!(gateway.init_calls(), 1);
    }

    #[tokio::test]
    async fn failed_initialize_can_be_retried() {
        let gateway = Arc::new(NullEncryption::new());
        gateway.fail_next_init(GatewayError::Transport("key server down".into()));
        let service = EncryptionService::new(gateway.clone());

        assert!(service.initialize(Some(&identity())).await.is_err());
        assert!(!service.is_ready());
        service.initialize(Some(&identity())).await.unwrap();
        assert_eq!(gateway.init_calls(), 2);
    }

    #[tokio::test]
    async fn encrypt_before_initialize_is_rejected_locally() {
        let gateway = Arc::new(NullEncryption::new());
        let service = EncryptionService::new(gateway.clone());
        let err = service.encrypt(&contract(), &identity(), 1).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::SubsystemNotInitialized));
        assert_eq!(gateway.encrypt_calls(), 0);
    }

    #[tokio::test]
    async fn out_of_range_plaintext_is_an_encryption_failure() {
        let service = EncryptionService::new(Arc::new(NullEncryption::new()));
        service.initialize(Some(&identity())).await.unwrap();
        let err = service
            .encrypt(&contract(), &identity(), u64::from(u32::MAX) + 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::EncryptionFailure(_)));
    }
}
