//! Encryption capability: client-side encryption and verifiable decryption.

use async_trait::async_trait;
use std::collections::HashMap;

use fhevote_types::{
    Ciphertext, ClearValuesEncoded, ContractAddress, DecryptionProof, EncryptedHandle,
    IdentityAddress, InputProof,
};

use crate::{GatewayError, TxReceipt};

/// Largest plaintext the encrypted integer type can hold.
pub const MAX_PLAINTEXT: u64 = u32::MAX as u64;

/// An encrypted input bound to a contract and an identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedInput {
    pub ciphertext: Ciphertext,
    pub proof: InputProof,
}

/// The commit half of a two-phase decryption.
///
/// The encryption service produces clear values and a proof, then hands both
/// to this commit, which submits them to the ledger for verification.
#[async_trait]
pub trait VerificationCommit: Send + Sync {
    async fn commit(
        &self,
        clear_values: ClearValuesEncoded,
        proof: DecryptionProof,
    ) -> Result<TxReceipt, GatewayError>;
}

/// Result of a decryption whose commit was confirmed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecryptionOutcome {
    pub clear_values: HashMap<EncryptedHandle, u64>,
    pub proof: DecryptionProof,
    pub receipt: TxReceipt,
}

impl DecryptionOutcome {
    pub fn value_for(&self, handle: &EncryptedHandle) -> Option<u64> {
        self.clear_values.get(handle).copied()
    }
}

/// The encryption/decryption service.
#[async_trait]
pub trait EncryptionGateway: Send + Sync {
    /// Human-readable name of this service, for logs.
    fn name(&self) -> &str;

    /// Load keys and parameters. Callers guarantee this is not re-entered.
    async fn initialize(&self) -> Result<(), GatewayError>;

    /// Encrypt `plaintext` for `contract`, on behalf of `identity`.
    async fn encrypt(
        &self,
        contract: &ContractAddress,
        identity: &IdentityAddress,
        plaintext: u64,
    ) -> Result<EncryptedInput, GatewayError>;

    /// Decrypt `handles`, then run `commit` with the clear values and proof.
    ///
    /// Resolves after the commit's transaction is confirmed; commit failures are
    /// returned unchanged.
    async fn request_decryption(
        &self,
        handles: &[EncryptedHandle],
        contract: &ContractAddress,
        commit: &dyn VerificationCommit,
    ) -> Result<DecryptionOutcome, GatewayError>;
}
