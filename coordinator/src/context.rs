use std::sync::Arc;
use std::time::Duration;

use fhevote_gateway::LedgerGateway;
use fhevote_types::Clock;

use crate::{
    Cancellation, CoordinatorError, CoordinatorMetrics, EncryptionService, LocalDataStore,
    TransactionStatusMachine,
};

/// Collaborators shared by the submission and decryption coordinators.
#[derive(Clone)]
pub struct CoordinatorContext {
    pub ledger: Arc<dyn LedgerGateway>,
    pub encryption: Arc<EncryptionService>,
    pub store: Arc<LocalDataStore>,
    pub status: Arc<TransactionStatusMachine>,
    pub metrics: Arc<CoordinatorMetrics>,
    pub clock: Arc<dyn Clock>,
    /// Bound on each submit-and-confirm wait. `None` waits indefinitely.
    pub confirmation_timeout: Option<Duration>,
}

impl CoordinatorContext {
    /// Record a terminal failure: log it, count it, show it.
    pub(crate) fn fail(&self, operation: &'static str, err: CoordinatorError) -> CoordinatorError {
        tracing::error!(operation, error = %err, "operation failed");
        self.metrics.failed_operations.inc();
        self.status.error(err.user_message());
        err
    }

    /// Refresh the local view after a confirmed write.
    ///
    /// The write already succeeded, so a failed refresh only replaces the
    /// success notification with "Failed to load data".
    pub(crate) async fn reload_after_write(&self, cancel: &Cancellation) {
        let err = match cancel.run(self.store.reload()).await {
            Ok(Ok(report)) => {
                tracing::debug!(loaded = report.loaded, "view refreshed after write");
                return;
            }
            Ok(Err(err)) | Err(err) => err,
        };
        tracing::warn!(error = %err, "refresh after write failed");
        self.status.error(err.user_message());
    }
}
