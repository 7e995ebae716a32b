//! Local, append-only log of the connected identity's own actions.

use serde::{Deserialize, Serialize};

use crate::{FeatureId, Timestamp};

/// One action taken by the connected identity during this session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryEntry {
    /// A feature was created with an encrypted vote.
    Create {
        feature_name: String,
        timestamp: Timestamp,
        vote_plaintext: u64,
    },
    /// A feature's tally was decrypted and verified on-ledger.
    Decrypt {
        feature_id: FeatureId,
        timestamp: Timestamp,
        revealed_value: u64,
    },
}

impl HistoryEntry {
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::Create { timestamp, .. } | Self::Decrypt { timestamp, .. } => *timestamp,
        }
    }

    /// Short label for display ("create" / "decrypt").
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Decrypt { .. } => "decrypt",
        }
    }
}
