//! Ledger capability: the voting contract as seen from the client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use fhevote_types::{
    Ciphertext, ClearValuesEncoded, ContractAddress, DecryptionProof, EncryptedHandle, FeatureId,
    FeatureRecord, InputProof,
};

use crate::GatewayError;

/// Proof of a confirmed (final) transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Hex-encoded transaction hash.
    pub tx_hash: String,
    /// Block the transaction was included in.
    pub block_number: u64,
}

/// Arguments of the record-creation transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateFeatureTx {
    pub id: FeatureId,
    pub name: String,
    pub ciphertext: Ciphertext,
    pub proof: InputProof,
    pub public_value1: u64,
    pub public_value2: u64,
    pub description: String,
}

/// Read and write access to the shared ledger.
///
/// Write methods resolve only once the transaction is confirmed. A
/// transaction the user declined to sign fails with
/// [`GatewayError::UserRejected`]; a verification that lost the race to
/// another party fails with [`GatewayError::AlreadyVerified`].
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Address of the voting contract.
    fn contract_address(&self) -> ContractAddress;

    /// Liveness probe of the contract.
    async fn is_available(&self) -> Result<bool, GatewayError>;

    async fn list_feature_ids(&self) -> Result<Vec<FeatureId>, GatewayError>;

    async fn get_feature_record(&self, id: &FeatureId) -> Result<FeatureRecord, GatewayError>;

    async fn get_encrypted_handle(&self, id: &FeatureId) -> Result<EncryptedHandle, GatewayError>;

    /// Submit a new record and wait for confirmation.
    async fn submit_create(&self, tx: CreateFeatureTx) -> Result<TxReceipt, GatewayError>;

    /// Submit a decryption result with its proof and wait for confirmation.
    async fn submit_verified_decryption(
        &self,
        id: &FeatureId,
        clear_values: ClearValuesEncoded,
        proof: DecryptionProof,
    ) -> Result<TxReceipt, GatewayError>;
}
