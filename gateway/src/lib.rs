//! External capabilities consumed by the encrypted-vote coordinator.
//!
//! The ledger (record storage and verification) and the encryption service
//! (client-side encryption, decryption with proof) live outside this
//! workspace. This crate fixes the contract between them and the
//! coordinator: two object-safe async traits, the payloads they exchange, and
//! a single error type whose variants carry the distinctions the coordinator
//! must act on (user declined to sign, already verified by someone else).

pub mod encryption;
pub mod error;
pub mod ledger;

pub use encryption::{
    DecryptionOutcome, EncryptedInput, EncryptionGateway, VerificationCommit, MAX_PLAINTEXT,
};
pub use error::GatewayError;
pub use ledger::{CreateFeatureTx, LedgerGateway, TxReceipt};
