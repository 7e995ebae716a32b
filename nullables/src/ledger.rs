//! Nullable ledger: an in-memory voting contract.
//!
//! Behaves like the real contract for everything the coordinator observes
//! (ids in creation order, monotonic verification, "already verified"
//! rejections) and adds knobs for the failures and races the coordinator
//! must survive.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fhevote_gateway::{CreateFeatureTx, GatewayError, LedgerGateway, TxReceipt};
use fhevote_types::{
    ClearValuesEncoded, Clock, ContractAddress, DecryptionProof, EncryptedHandle, FeatureId,
    FeatureRecord, IdentityAddress, Timestamp, VoteTally,
};

use crate::encryption::decode_clear_values;

/// One contract storage row, as the contract keeps it.
#[derive(Clone, Debug)]
struct Row {
    name: String,
    description: String,
    handle: EncryptedHandle,
    public_value1: u64,
    public_value2: u64,
    creator: IdentityAddress,
    timestamp: Timestamp,
    is_verified: bool,
    /// Stays at the contract's default (0) until verification.
    decrypted_value: u64,
}

impl Row {
    fn to_record(&self, id: &FeatureId) -> FeatureRecord {
        FeatureRecord {
            id: id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            encrypted_vote_handle: self.handle.clone(),
            public_value1: self.public_value1,
            public_value2: self.public_value2,
            creator: self.creator.clone(),
            timestamp: self.timestamp,
            tally: VoteTally::from_ledger(self.is_verified, self.decrypted_value),
        }
    }
}

#[derive(Default)]
struct State {
    order: Vec<FeatureId>,
    rows: HashMap<FeatureId, Row>,
    broken_records: HashSet<FeatureId>,
    /// Verifications another party lands as soon as the handle is read.
    pending_races: HashMap<FeatureId, u64>,
    /// Verifications another party lands while ours awaits confirmation.
    confirmation_races: HashMap<FeatureId, u64>,
    listing_failure: Option<GatewayError>,
    next_submit_failure: Option<GatewayError>,
    available: bool,
}

/// A test ledger that keeps records in memory.
pub struct NullLedger {
    contract: ContractAddress,
    signer: Mutex<IdentityAddress>,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
    confirmation_delay: Mutex<Option<Duration>>,
    block_number: AtomicU64,
    list_calls: AtomicUsize,
    record_fetches: AtomicUsize,
    create_submissions: AtomicUsize,
    verification_submissions: AtomicUsize,
}

impl NullLedger {
    pub fn new(contract: ContractAddress, signer: IdentityAddress, clock: Arc<dyn Clock>) -> Self {
        Self {
            contract,
            signer: Mutex::new(signer),
            clock,
            state: Mutex::new(State {
                available: true,
                ..State::default()
            }),
            confirmation_delay: Mutex::new(None),
            block_number: AtomicU64::new(0),
            list_calls: AtomicUsize::new(0),
            record_fetches: AtomicUsize::new(0),
            create_submissions: AtomicUsize::new(0),
            verification_submissions: AtomicUsize::new(0),
        }
    }

    /// Change the identity that signs subsequent transactions.
    pub fn set_signer(&self, signer: IdentityAddress) {
        *self.signer.lock().unwrap() = signer;
    }

    /// Insert a record directly, as if another identity had created it.
    pub fn seed_record(
        &self,
        id: &FeatureId,
        name: &str,
        description: &str,
        handle: EncryptedHandle,
        creator: IdentityAddress,
    ) {
        let mut state = self.state.lock().unwrap();
        state.order.push(id.clone());
        state.rows.insert(
            id.clone(),
            Row {
                name: name.to_string(),
                description: description.to_string(),
                handle,
                public_value1: 0,
                public_value2: 0,
                creator,
                timestamp: self.clock.now(),
                is_verified: false,
                decrypted_value: 0,
            },
        );
    }

    /// Verify a record right now, as another party would.
    pub fn verify_as_other(&self, id: &FeatureId, value: u64) {
        let mut state = self.state.lock().unwrap();
        if let Some(row) = state.rows.get_mut(id) {
            row.is_verified = true;
            row.decrypted_value = value;
        }
    }

    /// Have another party verify `id` with `value` the moment its handle is read.
    pub fn race_verification(&self, id: &FeatureId, value: u64) {
        self.state
            .lock()
            .unwrap()
            .pending_races
            .insert(id.clone(), value);
    }

    /// Have another party verify `id` with `value` while our own verification
    /// of it is waiting for confirmation.
    pub fn race_during_confirmation(&self, id: &FeatureId, value: u64) {
        self.state
            .lock()
            .unwrap()
            .confirmation_races
            .insert(id.clone(), value);
    }

    /// Make every fetch of `id` fail.
    pub fn break_record(&self, id: &FeatureId) {
        self.state.lock().unwrap().broken_records.insert(id.clone());
    }

    /// Make `list_feature_ids` fail until cleared with `None`.
    pub fn fail_listing(&self, error: Option<GatewayError>) {
        self.state.lock().unwrap().listing_failure = error;
    }

    /// Fail the next write submission (create or verification).
    pub fn fail_next_submission(&self, error: GatewayError) {
        self.state.lock().unwrap().next_submit_failure = Some(error);
    }

    pub fn set_available(&self, available: bool) {
        self.state.lock().unwrap().available = available;
    }

    /// Delay every confirmation by `delay`.
    pub fn set_confirmation_delay(&self, delay: Option<Duration>) {
        *self.confirmation_delay.lock().unwrap() = delay;
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn record_fetches(&self) -> usize {
        self.record_fetches.load(Ordering::SeqCst)
    }

    pub fn create_submissions(&self) -> usize {
        self.create_submissions.load(Ordering::SeqCst)
    }

    pub fn verification_submissions(&self) -> usize {
        self.verification_submissions.load(Ordering::SeqCst)
    }

    /// Total write transactions attempted.
    pub fn write_submissions(&self) -> usize {
        self.create_submissions() + self.verification_submissions()
    }

    pub fn record_count(&self) -> usize {
        self.state.lock().unwrap().order.len()
    }

    async fn confirm(&self) -> TxReceipt {
        let delay = *self.confirmation_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let block_number = self.block_number.fetch_add(1, Ordering::SeqCst) + 1;
        TxReceipt {
            tx_hash: format!("0x{block_number:064x}"),
            block_number,
        }
    }

    fn take_submit_failure(&self) -> Option<GatewayError> {
        self.state.lock().unwrap().next_submit_failure.take()
    }
}

#[async_trait]
impl LedgerGateway for NullLedger {
    fn contract_address(&self) -> ContractAddress {
        self.contract.clone()
    }

    async fn is_available(&self) -> Result<bool, GatewayError> {
        let available = self.state.lock().unwrap().available;
        if available {
            Ok(true)
        } else {
            Err(GatewayError::Transport("contract unreachable".into()))
        }
    }

    async fn list_feature_ids(&self) -> Result<Vec<FeatureId>, GatewayError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let state = self.state.lock().unwrap();
        if let Some(err) = &state.listing_failure {
            return Err(err.clone());
        }
        Ok(state.order.clone())
    }

    async fn get_feature_record(&self, id: &FeatureId) -> Result<FeatureRecord, GatewayError> {
        self.record_fetches.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let state = self.state.lock().unwrap();
        if state.broken_records.contains(id) {
            return Err(GatewayError::Transport(format!("decode failure for {id}")));
        }
        state
            .rows
            .get(id)
            .map(|row| row.to_record(id))
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }

    async fn get_encrypted_handle(&self, id: &FeatureId) -> Result<EncryptedHandle, GatewayError> {
        let mut state = self.state.lock().unwrap();
        let race = state.pending_races.remove(id);
        let row = state
            .rows
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        if let Some(value) = race {
            row.is_verified = true;
            row.decrypted_value = value;
        }
        Ok(row.handle.clone())
    }

    async fn submit_create(&self, tx: CreateFeatureTx) -> Result<TxReceipt, GatewayError> {
        self.create_submissions.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.take_submit_failure() {
            return Err(err);
        }
        let receipt = self.confirm().await;

        let creator = self.signer.lock().unwrap().clone();
        let mut state = self.state.lock().unwrap();
        if state.rows.contains_key(&tx.id) {
            return Err(GatewayError::Reverted("Business data already exists".into()));
        }
        state.order.push(tx.id.clone());
        state.rows.insert(
            tx.id,
            Row {
                name: tx.name,
                description: tx.description,
                handle: EncryptedHandle::new(tx.ciphertext.as_bytes().to_vec()),
                public_value1: tx.public_value1,
                public_value2: tx.public_value2,
                creator,
                timestamp: self.clock.now(),
                is_verified: false,
                decrypted_value: 0,
            },
        );
        Ok(receipt)
    }

    async fn submit_verified_decryption(
        &self,
        id: &FeatureId,
        clear_values: ClearValuesEncoded,
        proof: DecryptionProof,
    ) -> Result<TxReceipt, GatewayError> {
        self.verification_submissions.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.take_submit_failure() {
            return Err(err);
        }
        if proof.is_empty() {
            return Err(GatewayError::Reverted("Invalid decryption proof".into()));
        }
        let values = decode_clear_values(&clear_values)?;
        let value = *values
            .first()
            .ok_or_else(|| GatewayError::Reverted("no clear values".into()))?;

        {
            let state = self.state.lock().unwrap();
            let row = state
                .rows
                .get(id)
                .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
            if row.is_verified {
                return Err(GatewayError::classify("execution reverted: Data already verified"));
            }
        }

        let receipt = self.confirm().await;

        let mut state = self.state.lock().unwrap();
        let race = state.confirmation_races.remove(id);
        let row = state
            .rows
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        if let Some(other) = race {
            row.is_verified = true;
            row.decrypted_value = other;
        }
        // Re-check: another verification may have confirmed while we waited.
        if row.is_verified {
            return Err(GatewayError::AlreadyVerified);
        }
        row.is_verified = true;
        row.decrypted_value = value;
        Ok(receipt)
    }
}
