//! Creating feature records with an encrypted vote.

use std::sync::Arc;

use fhevote_gateway::CreateFeatureTx;
use fhevote_types::{FeatureDraft, FeatureId, HistoryEntry, IdGenerator, IdentityAddress};

use crate::cancel::bounded;
use crate::{Cancellation, CoordinatorContext, CoordinatorError};

pub const CREATE_PENDING: &str = "Creating feature with encrypted vote...";
pub const CONFIRMATION_PENDING: &str = "Waiting for transaction confirmation...";
pub const CREATE_SUCCESS: &str = "Feature created successfully!";

pub struct VoteSubmissionCoordinator {
    ctx: CoordinatorContext,
    ids: Arc<dyn IdGenerator>,
}

impl VoteSubmissionCoordinator {
    pub fn new(ctx: CoordinatorContext, ids: Arc<dyn IdGenerator>) -> Self {
        Self { ctx, ids }
    }

    /// Encrypt the draft's vote and create a new record carrying it.
    ///
    /// Every call creates a distinct record; nothing is retried. Returns the
    /// new record's id once its transaction is confirmed.
    pub async fn create_feature(
        &self,
        identity: Option<&IdentityAddress>,
        draft: FeatureDraft,
        cancel: &Cancellation,
    ) -> Result<FeatureId, CoordinatorError> {
        self.try_create(identity, &draft, cancel)
            .await
            .map_err(|err| self.ctx.fail("create_feature", err))
    }

    async fn try_create(
        &self,
        identity: Option<&IdentityAddress>,
        draft: &FeatureDraft,
        cancel: &Cancellation,
    ) -> Result<FeatureId, CoordinatorError> {
        let identity = identity.ok_or(CoordinatorError::IdentityNotConnected)?;
        let epoch = self.ctx.store.epoch();
        if !self.ctx.encryption.is_ready() {
            return Err(CoordinatorError::SubsystemNotInitialized);
        }
        if draft.has_blank_name() {
            return Err(CoordinatorError::InvalidInput(
                "Feature name is required".into(),
            ));
        }

        self.ctx.status.pending(CREATE_PENDING);
        let id = self.ids.next_id()?;
        let contract = self.ctx.ledger.contract_address();
        tracing::info!(feature_id = %id, name = %draft.name, "creating feature");

        let input = cancel
            .run(
                self.ctx
                    .encryption
                    .encrypt(&contract, identity, draft.vote_plaintext),
            )
            .await??;

        self.ctx.status.pending(CONFIRMATION_PENDING);
        let tx = CreateFeatureTx {
            id: id.clone(),
            name: draft.name.clone(),
            ciphertext: input.ciphertext,
            proof: input.proof,
            public_value1: draft.public_value1,
            public_value2: draft.public_value2,
            description: draft.description.clone(),
        };
        let receipt = bounded(
            self.ctx.ledger.submit_create(tx),
            cancel,
            self.ctx.confirmation_timeout,
        )
        .await?
        .map_err(CoordinatorError::from_submission)?;

        tracing::info!(
            feature_id = %id,
            tx_hash = %receipt.tx_hash,
            block = receipt.block_number,
            "feature created"
        );
        self.ctx.metrics.features_created.inc();
        let entry = HistoryEntry::Create {
            feature_name: draft.name.clone(),
            timestamp: self.ctx.clock.now(),
            vote_plaintext: draft.vote_plaintext,
        };
        if !self.ctx.store.push_history(epoch, entry) {
            // The session ended while we waited; the record is on the ledger regardless.
            return Ok(id);
        }
        self.ctx.status.success(CREATE_SUCCESS);
        self.ctx.reload_after_write(cancel).await;
        Ok(id)
    }
}
