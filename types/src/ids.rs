//! Feature id generation.
//!
//! Ids combine wall-clock milliseconds, a process-local sequence number and 64
//! bits of OS entropy, so two creators submitting in the same millisecond (in
//! this process or another) still get distinct ids.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::{Clock, FeatureId, SystemClock, TypeError};

/// Default prefix for generated ids.
pub const DEFAULT_ID_PREFIX: &str = "feature";

/// Source of fresh, unique feature ids.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Result<FeatureId, TypeError>;
}

/// Production id generator: `<prefix>-<millis>-<seq>-<16 hex chars of entropy>`.
pub struct RandomIdGenerator {
    prefix: String,
    clock: Arc<dyn Clock>,
    sequence: AtomicU64,
}

impl RandomIdGenerator {
    pub fn new(prefix: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            prefix: prefix.into(),
            clock,
            sequence: AtomicU64::new(0),
        }
    }
}

impl Default for RandomIdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_ID_PREFIX, Arc::new(SystemClock))
    }
}

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self) -> Result<FeatureId, TypeError> {
        let mut entropy = [0u8; 8];
        getrandom::getrandom(&mut entropy).map_err(|e| TypeError::Entropy(e.to_string()))?;
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        FeatureId::new(format!(
            "{}-{}-{}-{}",
            self.prefix,
            self.clock.now_millis(),
            seq,
            hex::encode(entropy)
        ))
    }
}
