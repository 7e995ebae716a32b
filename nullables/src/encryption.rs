//! Nullable encryption service: reversible fake ciphertexts, real call flow.
//!
//! Ciphertexts are unique byte strings that this service remembers the
//! plaintext of; the ledger nullable uses the ciphertext bytes as the handle,
//! so decryption is a table lookup. Clear values use a 32-byte big-endian
//! word per value, the shape a contract verifier expects.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use fhevote_gateway::{
    DecryptionOutcome, EncryptedInput, EncryptionGateway, GatewayError, VerificationCommit,
    MAX_PLAINTEXT,
};
use fhevote_types::{
    Ciphertext, ClearValuesEncoded, ContractAddress, DecryptionProof, EncryptedHandle,
    IdentityAddress, InputProof,
};

const WORD: usize = 32;

/// Encode clear values as consecutive 32-byte big-endian words.
pub fn encode_clear_values(values: &[u64]) -> ClearValuesEncoded {
    let mut out = Vec::with_capacity(values.len() * WORD);
    for value in values {
        out.extend_from_slice(&[0u8; WORD - 8]);
        out.extend_from_slice(&value.to_be_bytes());
    }
    ClearValuesEncoded::new(out)
}

/// Decode the output of [`encode_clear_values`].
pub fn decode_clear_values(encoded: &ClearValuesEncoded) -> Result<Vec<u64>, GatewayError> {
    let bytes = encoded.as_bytes();
    if bytes.len() % WORD != 0 {
        return Err(GatewayError::Reverted(format!(
            "clear values length {} is not a multiple of {WORD}",
            bytes.len()
        )));
    }
    bytes
        .chunks(WORD)
        .map(|word| {
            if word[..WORD - 8].iter().any(|b| *b != 0) {
                return Err(GatewayError::Reverted("clear value overflows u64".into()));
            }
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&word[WORD - 8..]);
            Ok(u64::from_be_bytes(buf))
        })
        .collect()
}

/// A test encryption service.
pub struct NullEncryption {
    initialized: Mutex<bool>,
    init_calls: AtomicUsize,
    init_delay: Mutex<Option<Duration>>,
    init_failure: Mutex<Option<GatewayError>>,
    encrypt_calls: AtomicUsize,
    encrypt_failure: Mutex<Option<GatewayError>>,
    decryption_requests: AtomicUsize,
    decryption_failure: Mutex<Option<GatewayError>>,
    /// ciphertext bytes -> plaintext
    plaintexts: Mutex<HashMap<Vec<u8>, u64>>,
    counter: AtomicU64,
}

impl NullEncryption {
    pub fn new() -> Self {
        Self {
            initialized: Mutex::new(false),
            init_calls: AtomicUsize::new(0),
            init_delay: Mutex::new(None),
            init_failure: Mutex::new(None),
            encrypt_calls: AtomicUsize::new(0),
            encrypt_failure: Mutex::new(None),
            decryption_requests: AtomicUsize::new(0),
            decryption_failure: Mutex::new(None),
            plaintexts: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
        }
    }

    /// Make `initialize` take this long (to observe overlapping callers).
    pub fn set_init_delay(&self, delay: Duration) {
        *self.init_delay.lock().unwrap() = Some(delay);
    }

    /// Fail the next `initialize` call.
    pub fn fail_next_init(&self, error: GatewayError) {
        *self.init_failure.lock().unwrap() = Some(error);
    }

    /// Fail the next `encrypt` call.
    pub fn fail_next_encrypt(&self, error: GatewayError) {
        *self.encrypt_failure.lock().unwrap() = Some(error);
    }

    /// Fail the next `request_decryption` before its commit runs.
    pub fn fail_next_decryption(&self, error: GatewayError) {
        *self.decryption_failure.lock().unwrap() = Some(error);
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn encrypt_calls(&self) -> usize {
        self.encrypt_calls.load(Ordering::SeqCst)
    }

    pub fn decryption_requests(&self) -> usize {
        self.decryption_requests.load(Ordering::SeqCst)
    }

    pub fn is_initialized(&self) -> bool {
        *self.initialized.lock().unwrap()
    }

    /// Register a ciphertext created elsewhere (e.g. a record seeded into the ledger).
    pub fn register_ciphertext(&self, ciphertext: &[u8], plaintext: u64) {
        self.plaintexts
            .lock()
            .unwrap()
            .insert(ciphertext.to_vec(), plaintext);
    }

    fn require_initialized(&self) -> Result<(), GatewayError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(GatewayError::NotInitialized)
        }
    }
}

impl Default for NullEncryption {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EncryptionGateway for NullEncryption {
    fn name(&self) -> &str {
        "null-encryption"
    }

    async fn initialize(&self) -> Result<(), GatewayError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.init_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.init_failure.lock().unwrap().take() {
            return Err(err);
        }
        *self.initialized.lock().unwrap() = true;
        Ok(())
    }

    async fn encrypt(
        &self,
        contract: &ContractAddress,
        identity: &IdentityAddress,
        plaintext: u64,
    ) -> Result<EncryptedInput, GatewayError> {
        self.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        self.require_initialized()?;
        if let Some(err) = self.encrypt_failure.lock().unwrap().take() {
            return Err(err);
        }
        if plaintext > MAX_PLAINTEXT {
            return Err(GatewayError::OutOfRange {
                value: plaintext,
                max: MAX_PLAINTEXT,
            });
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let mut bytes = b"nullct:".to_vec();
        bytes.extend_from_slice(&n.to_be_bytes());
        self.register_ciphertext(&bytes, plaintext);

        Ok(EncryptedInput {
            ciphertext: Ciphertext::new(bytes),
            proof: InputProof::new(format!("input-proof:{contract}:{identity}").into_bytes()),
        })
    }

    async fn request_decryption(
        &self,
        handles: &[EncryptedHandle],
        _contract: &ContractAddress,
        commit: &dyn VerificationCommit,
    ) -> Result<DecryptionOutcome, GatewayError> {
        self.decryption_requests.fetch_add(1, Ordering::SeqCst);
        self.require_initialized()?;
        if let Some(err) = self.decryption_failure.lock().unwrap().take() {
            return Err(err);
        }

        let mut clear_values = HashMap::with_capacity(handles.len());
        let mut ordered = Vec::with_capacity(handles.len());
        {
            let plaintexts = self.plaintexts.lock().unwrap();
            for handle in handles {
                let value = plaintexts
                    .get(handle.as_bytes())
                    .copied()
                    .ok_or_else(|| GatewayError::NotFound(handle.to_hex()))?;
                clear_values.insert(handle.clone(), value);
                ordered.push(value);
            }
        }

        let mut proof_bytes = b"decryption-proof:".to_vec();
        for handle in handles {
            proof_bytes.extend_from_slice(handle.as_bytes());
        }
        let proof = DecryptionProof::new(proof_bytes);

        tracing::debug!(handles = handles.len(), "null decryption committing");
        let receipt = commit
            .commit(encode_clear_values(&ordered), proof.clone())
            .await?;

        Ok(DecryptionOutcome {
            clear_values,
            proof,
            receipt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhevote_gateway::TxReceipt;

    struct RecordingCommit {
        seen: Mutex<Vec<(ClearValuesEncoded, DecryptionProof)>>,
        result: Result<TxReceipt, GatewayError>,
    }

    #[async_trait]
    impl VerificationCommit for RecordingCommit {
        async fn commit(
            &self,
            clear_values: ClearValuesEncoded,
            proof: DecryptionProof,
        ) -> Result<TxReceipt, GatewayError> {
            self.seen.lock().unwrap().push((clear_values, proof));
            self.result.clone()
        }
    }

    fn contract() -> ContractAddress {
        ContractAddress::from_bytes([9; 20])
    }

    fn identity() -> IdentityAddress {
        IdentityAddress::from_bytes([1; 20])
    }

    #[test]
    fn clear_value_encoding_roundtrip() {
        let encoded = encode_clear_values(&[0, 5, u64::MAX]);
        assert_eq!(encoded.as_bytes().len(), 96);
        assert_eq!(decode_clear_values(&encoded).unwrap(), vec![0, 5, u64::MAX]);
    }

    #[test]
    fn decode_rejects_partial_words() {
        assert!(decode_clear_values(&ClearValuesEncoded::new(vec![0; 31])).is_err());
    }

    #[tokio::test]
    async fn encrypt_requires_initialize() {
        let enc = NullEncryption::new();
        let err = enc.encrypt(&contract(), &identity(), 1).await.unwrap_err();
        assert_eq!(err, GatewayError::NotInitialized);
        enc.initialize().await.unwrap();
        assert!(enc.encrypt(&contract(), &identity(), 1).await.is_ok());
    }

    #[tokio::test]
    async fn encrypt_rejects_out_of_range() {
        let enc = NullEncryption::new();
        enc.initialize().await.unwrap();
        let err = enc
            .encrypt(&contract(), &identity(), MAX_PLAINTEXT + 1)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::OutOfRange { .. }));
    }

    #[tokio::test]
    async fn decryption_passes_its_proof_to_the_commit() {
        let enc = NullEncryption::new();
        enc.initialize().await.unwrap();
        let input = enc.encrypt(&contract(), &identity(), 5).await.unwrap();
        let handle = EncryptedHandle::new(input.ciphertext.as_bytes().to_vec());

        let commit = RecordingCommit {
            seen: Mutex::new(Vec::new()),
            result: Ok(TxReceipt {
                tx_hash: "0x01".into(),
                block_number: 1,
            }),
        };
        let outcome = enc
            .request_decryption(std::slice::from_ref(&handle), &contract(), &commit)
            .await
            .unwrap();

        assert_eq!(outcome.value_for(&handle), Some(5));
        let seen = commit.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, outcome.proof);
        assert_eq!(decode_clear_values(&seen[0].0).unwrap(), vec![5]);
    }

    #[tokio::test]
    async fn commit_failure_is_returned_unchanged() {
        let enc = NullEncryption::new();
        enc.initialize().await.unwrap();
        let input = enc.encrypt(&contract(), &identity(), 5).await.unwrap();
        let handle = EncryptedHandle::new(input.ciphertext.as_bytes().to_vec());
        let commit = RecordingCommit {
            seen: Mutex::new(Vec::new()),
            result: Err(GatewayError::AlreadyVerified),
        };
        let err = enc
            .request_decryption(&[handle], &contract(), &commit)
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::AlreadyVerified);
    }
}
