//! Nullable id generator: predictable feature ids.

use fhevote_types::{FeatureId, IdGenerator, TypeError};
use std::sync::Mutex;

/// A deterministic id source for testing.
///
/// Either counts up (`<prefix>-0`, `<prefix>-1`, ...) or replays a fixed list
/// in order, cycling when it runs out.
pub struct NullIdGenerator {
    prefix: String,
    script: Vec<String>,
    index: Mutex<usize>,
}

impl NullIdGenerator {
    pub fn sequential(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            script: Vec::new(),
            index: Mutex::new(0),
        }
    }

    /// Replay the given ids in order.
    pub fn scripted(ids: Vec<String>) -> Self {
        Self {
            prefix: String::new(),
            script: ids,
            index: Mutex::new(0),
        }
    }
}

impl IdGenerator for NullIdGenerator {
    fn next_id(&self) -> Result<FeatureId, TypeError> {
        let mut idx = self.index.lock().unwrap();
        let current = *idx;
        *idx += 1;
        if self.script.is_empty() {
            FeatureId::new(format!("{}-{}", self.prefix, current))
        } else {
            FeatureId::new(self.script[current % self.script.len()].clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_counts_up() {
        let ids = NullIdGenerator::sequential("feature");
        assert_eq!(ids.next_id().unwrap().as_str(), "feature-0");
        assert_eq!(ids.next_id().unwrap().as_str(), "feature-1");
    }

    #[test]
    fn scripted_cycles() {
        let ids = NullIdGenerator::scripted(vec!["a".into(), "b".into()]);
        let got: Vec<String> = (0..3).map(|_| ids.next_id().unwrap().to_string()).collect();
        assert_eq!(got, ["a", "b", "a"]);
    }
}
