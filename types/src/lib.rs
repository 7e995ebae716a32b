//! Fundamental types for encrypted feature voting.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! identity and contract addresses, feature records and their sealed tallies,
//! opaque ciphertext/handle/proof wrappers, the local action history, timestamps
//! and feature id generation.

pub mod address;
pub mod error;
pub mod feature;
pub mod handle;
pub mod history;
pub mod ids;
pub mod time;

pub use address::{ContractAddress, IdentityAddress};
pub use error::TypeError;
pub use feature::{FeatureDraft, FeatureId, FeatureRecord, VoteTally};
pub use handle::{Ciphertext, ClearValuesEncoded, DecryptionProof, EncryptedHandle, InputProof};
pub use history::HistoryEntry;
pub use ids::{IdGenerator, RandomIdGenerator, DEFAULT_ID_PREFIX};
pub use time::{Clock, SystemClock, Timestamp};
