//! Feature records: the entities being voted on.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{EncryptedHandle, IdentityAddress, Timestamp, TypeError};

/// Unique identifier of a feature record, assigned at creation.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureId(String);

impl FeatureId {
    /// Maximum identifier length accepted by the ledger.
    pub const MAX_LEN: usize = 128;

    pub fn new(raw: impl Into<String>) -> Result<Self, TypeError> {
        let raw = raw.into();
        if raw.is_empty() || raw.len() > Self::MAX_LEN {
            return Err(TypeError::InvalidFeatureId(raw));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The vote tally of a record as it may be shown to anyone.
///
/// The ledger keeps a numeric `decrypted_value` even before verification.
/// That number is a default, not a tally, so it never leaves [`VoteTally::from_ledger`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteTally {
    /// Not yet verified on-ledger; the value is unknown.
    Sealed,
    /// Verified on-ledger with this clear value.
    Revealed(u64),
}

impl VoteTally {
    /// Build the tally from the ledger's raw `(is_verified, decrypted_value)` pair.
    pub fn from_ledger(is_verified: bool, decrypted_value: u64) -> Self {
        if is_verified {
            Self::Revealed(decrypted_value)
        } else {
            Self::Sealed
        }
    }

    pub fn is_revealed(&self) -> bool {
        matches!(self, Self::Revealed(_))
    }

    pub fn value(&self) -> Option<u64> {
        match self {
            Self::Revealed(v) => Some(*v),
            Self::Sealed => None,
        }
    }
}

impl fmt::Display for VoteTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sealed => write!(f, "sealed"),
            Self::Revealed(v) => write!(f, "{v}"),
        }
    }
}

/// One proposed feature and its (possibly sealed) vote tally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub id: FeatureId,
    pub name: String,
    pub description: String,
    /// Ledger reference to the encrypted vote.
    pub encrypted_vote_handle: EncryptedHandle,
    pub public_value1: u64,
    pub public_value2: u64,
    pub creator: IdentityAddress,
    /// Creation time, seconds since epoch.
    pub timestamp: Timestamp,
    pub tally: VoteTally,
}

impl FeatureRecord {
    pub fn is_verified(&self) -> bool {
        self.tally.is_revealed()
    }

    /// The verified vote count, `None` while the tally is sealed.
    pub fn revealed_votes(&self) -> Option<u64> {
        self.tally.value()
    }

    /// Case-insensitive substring match on name or description.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.name.to_lowercase().contains(&term) || self.description.to_lowercase().contains(&term)
    }
}

/// Input for creating a new feature record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureDraft {
    pub name: String,
    pub description: String,
    /// The plaintext vote, encrypted before it leaves the process.
    pub vote_plaintext: u64,
    pub public_value1: u64,
    pub public_value2: u64,
}

impl FeatureDraft {
    /// A draft with both public values fixed at zero.
    pub fn new(name: impl Into<String>, description: impl Into<String>, vote_plaintext: u64) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            vote_plaintext,
            public_value1: 0,
            public_value2: 0,
        }
    }

    pub fn with_public_values(mut self, public_value1: u64, public_value2: u64) -> Self {
        self.public_value1 = public_value1;
        self.public_value2 = public_value2;
        self
    }

    /// Whether the name is blank after trimming.
    pub fn has_blank_name(&self) -> bool {
        self.name.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, description: &str, tally: VoteTally) -> FeatureRecord {
        FeatureRecord {
            id: FeatureId::new("feature-1").unwrap(),
            name: name.to_string(),
            description: description.to_string(),
            encrypted_vote_handle: EncryptedHandle::new(vec![1; 32]),
            public_value1: 0,
            public_value2: 0,
            creator: IdentityAddress::from_bytes([1; 20]),
            timestamp: Timestamp::new(1_700_000_000),
            tally,
        }
    }

    #[test]
    fn unverified_ledger_value_is_discarded() {
        let tally = VoteTally::from_ledger(false, 42);
        assert_eq!(tally, VoteTally::Sealed);
        assert_eq!(tally.value(), None);
    }

    #[test]
    fn verified_ledger_value_is_kept() {
        assert_eq!(VoteTally::from_ledger(true, 42).value(), Some(42));
    }

    #[test]
    fn sealed_tally_displays_as_sealed() {
        assert_eq!(VoteTally::Sealed.to_string(), "sealed");
        assert_eq!(VoteTally::Revealed(7).to_string(), "7");
    }

    #[test]
    fn matches_is_case_insensitive_on_both_fields() {
        let r = record("Dark Mode", "Add dark theme", VoteTally::Sealed);
        assert!(r.matches("dark"));
        assert!(r.matches("THEME"));
        assert!(!r.matches("offline"));
    }

    #[test]
    fn feature_id_rejects_empty_and_oversized() {
        assert!(FeatureId::new("").is_err());
        assert!(FeatureId::new("x".repeat(FeatureId::MAX_LEN + 1)).is_err());
        assert!(FeatureId::new("feature-1").is_ok());
    }

    #[test]
    fn draft_defaults_public_values_to_zero() {
        let draft = FeatureDraft::new("Dark Mode", "Add dark theme", 5);
        assert_eq!((draft.public_value1, draft.public_value2), (0, 0));
        let draft = draft.with_public_values(3, 4);
        assert_eq!((draft.public_value1, draft.public_value2), (3, 4));
    }

    #[test]
    fn blank_name_detection() {
        assert!(FeatureDraft::new("   ", "", 1).has_blank_name());
        assert!(!FeatureDraft::new("x", "", 1).has_blank_name());
    }
}
