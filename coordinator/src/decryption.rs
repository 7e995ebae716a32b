//! Revealing a record's tally through a verified decryption.
//!
//! A reveal is two-phase. The encryption service decrypts the handle and
//! produces a proof, then hands both to a [`VerificationCommit`] that submits
//! them to the ledger. Only once that verification is confirmed does the
//! clear value count as revealed. Losing the race to another verifier is not
//! an error: the ledger already holds the value we wanted.

use async_trait::async_trait;

use fhevote_gateway::{GatewayError, LedgerGateway, TxReceipt, VerificationCommit};
use fhevote_types::{
    ClearValuesEncoded, DecryptionProof, FeatureId, HistoryEntry, IdentityAddress,
};

use crate::cancel::bounded;
use crate::{Cancellation, CoordinatorContext, CoordinatorError};

pub const REVEAL_PENDING: &str = "Decrypting and verifying on-chain...";
pub const REVEAL_SUCCESS: &str = "Data decrypted and verified successfully!";
pub const ALREADY_VERIFIED: &str = "Data already verified on-chain";
pub const VERIFIED_BY_OTHER: &str = "Data is already verified on-chain";

/// Submits a decryption result for one record.
struct LedgerCommit<'a> {
    ledger: &'a dyn LedgerGateway,
    feature_id: &'a FeatureId,
}

#[async_trait]
impl<'a> VerificationCommit for LedgerCommit<'a> {
    async fn commit(
        &self,
        clear_values: ClearValuesEncoded,
        proof: DecryptionProof,
    ) -> Result<TxReceipt, GatewayError> {
        tracing::debug!(feature_id = %self.feature_id, "submitting verified decryption");
        self.ledger
            .submit_verified_decryption(self.feature_id, clear_values, proof)
            .await
    }
}

pub struct DecryptionCoordinator {
    ctx: CoordinatorContext,
}

impl DecryptionCoordinator {
    pub fn new(ctx: CoordinatorContext) -> Self {
        Self { ctx }
    }

    /// Reveal the vote tally of `feature_id`.
    ///
    /// An already-verified record is answered from the ledger without any
    /// write. Otherwise exactly one verification is submitted. `None` is only
    /// returned when another party verified first and the refreshed record
    /// could not be read back.
    pub async fn reveal_votes(
        &self,
        identity: Option<&IdentityAddress>,
        feature_id: &FeatureId,
        cancel: &Cancellation,
    ) -> Result<Option<u64>, CoordinatorError> {
        self.try_reveal(identity, feature_id, cancel)
            .await
            .map_err(|err| self.ctx.fail("reveal_votes", err))
    }

    async fn try_reveal(
        &self,
        identity: Option<&IdentityAddress>,
        feature_id: &FeatureId,
        cancel: &Cancellation,
    ) -> Result<Option<u64>, CoordinatorError> {
        identity.ok_or(CoordinatorError::IdentityNotConnected)?;
        let epoch = self.ctx.store.epoch();
        let ledger = self.ctx.ledger.as_ref();

        let record = cancel
            .run(ledger.get_feature_record(feature_id))
            .await?
            .map_err(|e| CoordinatorError::DecryptionFailure(e.to_string()))?;
        if let Some(value) = record.revealed_votes() {
            tracing::info!(feature_id = %feature_id, value, "record already verified");
            self.ctx.metrics.reveals_cached.inc();
            self.ctx.status.success(ALREADY_VERIFIED);
            return Ok(Some(value));
        }

        if !self.ctx.encryption.is_ready() {
            return Err(CoordinatorError::SubsystemNotInitialized);
        }
        self.ctx.status.pending(REVEAL_PENDING);

        let handle = cancel
            .run(ledger.get_encrypted_handle(feature_id))
            .await?
            .map_err(|e| CoordinatorError::DecryptionFailure(e.to_string()))?;
        let contract = ledger.contract_address();
        let commit = LedgerCommit { ledger, feature_id };

        let handles = [handle];
        let result = bounded(
            self.ctx
                .encryption
                .request_decryption(&handles, &contract, &commit),
            cancel,
            self.ctx.confirmation_timeout,
        )
        .await?;

        match result {
            Ok(outcome) => {
                let value = outcome.value_for(&handles[0]).ok_or_else(|| {
                    CoordinatorError::DecryptionFailure("no clear value for handle".into())
                })?;
                tracing::info!(
                    feature_id = %feature_id,
                    value,
                    tx_hash = %outcome.receipt.tx_hash,
                    "decryption verified"
                );
                self.ctx.metrics.reveals_verified.inc();
                let entry = HistoryEntry::Decrypt {
                    feature_id: feature_id.clone(),
                    timestamp: self.ctx.clock.now(),
                    revealed_value: value,
                };
                if !self.ctx.store.push_history(epoch, entry) {
                    return Ok(Some(value));
                }
                self.ctx.status.success(REVEAL_SUCCESS);
                self.ctx.reload_after_write(cancel).await;
                Ok(Some(value))
            }
            Err(err) if err.is_already_verified() => {
                tracing::info!(feature_id = %feature_id, "verified concurrently by another party");
                self.ctx.metrics.verification_conflicts.inc();
                self.ctx.status.success(VERIFIED_BY_OTHER);
                self.ctx.reload_after_write(cancel).await;
                Ok(self
                    .ctx
                    .store
                    .record(feature_id)
                    .and_then(|r| r.revealed_votes()))
            }
            Err(err) => Err(CoordinatorError::DecryptionFailure(err.to_string())),
        }
    }
}
