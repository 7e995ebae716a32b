//! One connected identity's view of the voting contract.
//!
//! [`Session`] owns every piece of mutable state (identity, record cache,
//! history, status, cancel signal) and is the only way to change it. UIs and
//! the simulator drive a session; they never touch the coordinators directly.

use std::sync::{Arc, Mutex};

use fhevote_gateway::{EncryptionGateway, LedgerGateway};
use fhevote_types::{Clock, ContractAddress, FeatureDraft, FeatureId, IdGenerator, IdentityAddress};

use crate::{
    lock, CancelSource, Cancellation, CoordinatorConfig, CoordinatorContext, CoordinatorError,
    CoordinatorMetrics, DecryptionCoordinator, EncryptionService, LocalDataStore, ReloadReport,
    TransactionStatusMachine, VoteSubmissionCoordinator,
};

pub const INIT_FAILED: &str = "Encryption subsystem initialization failed";
pub const CONTRACT_AVAILABLE: &str = "Contract is available and working!";
pub const CONTRACT_UNAVAILABLE: &str = "Contract call failed";

pub struct Session {
    config: CoordinatorConfig,
    ctx: CoordinatorContext,
    submission: VoteSubmissionCoordinator,
    decryption: DecryptionCoordinator,
    identity: Mutex<Option<IdentityAddress>>,
    /// Replaced on every disconnect so new operations get a fresh signal.
    cancel: Mutex<CancelSource>,
}

impl Session {
    pub fn new(
        config: CoordinatorConfig,
        ledger: Arc<dyn LedgerGateway>,
        encryption: Arc<dyn EncryptionGateway>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        let metrics = Arc::new(CoordinatorMetrics::new());
        let ctx = CoordinatorContext {
            store: Arc::new(LocalDataStore::new(ledger.clone(), metrics.clone())),
            status: Arc::new(TransactionStatusMachine::new(
                config.success_dismiss(),
                config.error_dismiss(),
            )),
            encryption: Arc::new(EncryptionService::new(encryption)),
            confirmation_timeout: config.confirmation_timeout(),
            ledger,
            metrics,
            clock,
        };
        Self {
            submission: VoteSubmissionCoordinator::new(ctx.clone(), ids),
            decryption: DecryptionCoordinator::new(ctx.clone()),
            config,
            ctx,
            identity: Mutex::new(None),
            cancel: Mutex::new(CancelSource::new()),
        }
    }

    /// Attach `identity`, bring up encryption, and load the records.
    ///
    /// Connecting while another identity is attached ends that session
    /// first, exactly as [`Session::disconnect`] does. An encryption init
    /// failure is shown but does not fail the connect: reading and revealing
    /// already-verified records still works.
    pub async fn connect(&self, identity: IdentityAddress) -> Result<ReloadReport, CoordinatorError> {
        if let Some(previous) = self.end_session() {
            tracing::info!(previous = %previous, "ending previous session");
        }
        tracing::info!(identity = %identity, contract = %self.contract_address(), "connecting");
        *lock(&self.identity) = Some(identity);
        if let Err(err) = self.initialize_encryption().await {
            tracing::warn!(error = %err, "continuing without encryption");
        }
        self.reload().await
    }

    /// Cancel everything in flight and forget the identity and its data.
    pub fn disconnect(&self) {
        let previous = self.end_session();
        tracing::info!(identity = ?previous, "disconnected");
    }

    /// Cancel in-flight work and drop the identity, cache, history and status.
    /// Returns the identity that was attached, if any.
    fn end_session(&self) -> Option<IdentityAddress> {
        {
            let mut cancel = lock(&self.cancel);
            cancel.cancel();
            *cancel = CancelSource::new();
        }
        let previous = lock(&self.identity).take();
        self.ctx.store.clear();
        self.ctx.status.clear();
        previous
    }

    pub async fn initialize_encryption(&self) -> Result<(), CoordinatorError> {
        let identity = self.identity();
        let result = self
            .token()
            .run(self.ctx.encryption.initialize(identity.as_ref()))
            .await
            .and_then(|r| r);
        if let Err(err) = &result {
            tracing::error!(error = %err, "encryption initialization failed");
            self.ctx.metrics.failed_operations.inc();
            let message = match err {
                CoordinatorError::EncryptionFailure(_) => INIT_FAILED.to_string(),
                other => other.user_message(),
            };
            self.ctx.status.error(message);
        }
        result
    }

    pub async fn create_feature(&self, draft: FeatureDraft) -> Result<FeatureId, CoordinatorError> {
        self.create_feature_with(draft, &Cancellation::never()).await
    }

    /// Like [`Session::create_feature`], also stopping when `cancel` fires.
    pub async fn create_feature_with(
        &self,
        draft: FeatureDraft,
        cancel: &Cancellation,
    ) -> Result<FeatureId, CoordinatorError> {
        let token = cancel.clone().or(&self.token());
        let identity = self.identity();
        self.submission
            .create_feature(identity.as_ref(), draft, &token)
            .await
    }

    pub async fn reveal_votes(&self, feature_id: &FeatureId) -> Result<Option<u64>, CoordinatorError> {
        self.reveal_votes_with(feature_id, &Cancellation::never()).await
    }

    pub async fn reveal_votes_with(
        &self,
        feature_id: &FeatureId,
        cancel: &Cancellation,
    ) -> Result<Option<u64>, CoordinatorError> {
        let token = cancel.clone().or(&self.token());
        let identity = self.identity();
        self.decryption
            .reveal_votes(identity.as_ref(), feature_id, &token)
            .await
    }

    /// Rebuild the local view. A failure is shown as "Failed to load data".
    ///
    /// Without a connected identity nothing is fetched: the cache belongs to
    /// a session and stays empty between sessions.
    pub async fn reload(&self) -> Result<ReloadReport, CoordinatorError> {
        if !self.is_connected() {
            tracing::debug!("reload skipped, no identity connected");
            return Err(CoordinatorError::IdentityNotConnected);
        }
        let result = self
            .token()
            .run(self.ctx.store.reload())
            .await
            .and_then(|r| r);
        if let Err(err) = &result {
            self.ctx.metrics.failed_operations.inc();
            self.ctx.status.error(err.user_message());
        }
        result
    }

    /// Probe the contract and show the outcome.
    pub async fn check_availability(&self) -> Result<bool, CoordinatorError> {
        let available = match self.token().run(self.ctx.ledger.is_available()).await? {
            Ok(available) => available,
            Err(err) => {
                tracing::warn!(error = %err, "contract probe failed");
                false
            }
        };
        if available {
            self.ctx.status.success(CONTRACT_AVAILABLE);
        } else {
            self.ctx.status.error(CONTRACT_UNAVAILABLE);
        }
        Ok(available)
    }

    pub fn identity(&self) -> Option<IdentityAddress> {
        lock(&self.identity).clone()
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.identity).is_some()
    }

    pub fn is_encryption_ready(&self) -> bool {
        self.ctx.encryption.is_ready()
    }

    pub fn contract_address(&self) -> ContractAddress {
        self.ctx.ledger.contract_address()
    }

    pub fn store(&self) -> &LocalDataStore {
        &self.ctx.store
    }

    pub fn status(&self) -> &TransactionStatusMachine {
        &self.ctx.status
    }

    pub fn metrics(&self) -> &CoordinatorMetrics {
        &self.ctx.metrics
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    fn token(&self) -> Cancellation {
        lock(&self.cancel).token()
    }
}
