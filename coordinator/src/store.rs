//! The local view of the ledger: cached records, the session's own action
//! history, and statistics derived from both.
//!
//! Reloads are single-flight. The first trigger spawns a driver task that
//! runs passes back to back; a trigger arriving while a pass is in flight
//! marks one trailing pass and waits for it. However many triggers pile up,
//! at most one pass runs at a time and at most one more is queued, and no
//! caller is answered with data fetched before its own trigger.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::watch;

use fhevote_gateway::LedgerGateway;
use fhevote_types::{FeatureId, FeatureRecord, HistoryEntry, VoteTally};

use crate::{lock, CoordinatorError, CoordinatorMetrics};

/// Aggregates shown next to the record list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DerivedStats {
    pub total: usize,
    pub verified: usize,
    /// Sum of revealed tallies. Sealed records contribute nothing.
    pub total_votes: u64,
    pub history_len: usize,
}

impl DerivedStats {
    pub fn compute(records: &[FeatureRecord], history: &[HistoryEntry]) -> Self {
        let verified = records.iter().filter(|r| r.is_verified()).count();
        let total_votes = records
            .iter()
            .filter_map(FeatureRecord::revealed_votes)
            .fold(0u64, u64::saturating_add);
        Self {
            total: records.len(),
            verified,
            total_votes,
            history_len: history.len(),
        }
    }
}

/// What one reload pass produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReloadReport {
    pub loaded: usize,
    /// Records omitted because their fetch failed, with the reason.
    pub skipped: Vec<(FeatureId, String)>,
}

impl ReloadReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

#[derive(Default)]
struct View {
    /// Bumped by [`LocalDataStore::clear`]; passes started under an older
    /// epoch are discarded.
    epoch: u64,
    records: Vec<FeatureRecord>,
    /// Newest first.
    history: Vec<HistoryEntry>,
}

#[derive(Default)]
struct Gate {
    running: bool,
    rerun: bool,
    completed: u64,
}

#[derive(Clone, Debug)]
struct PassOutcome {
    completed: u64,
    result: Result<ReloadReport, String>,
}

pub struct LocalDataStore {
    ledger: Arc<dyn LedgerGateway>,
    metrics: Arc<CoordinatorMetrics>,
    view: Mutex<View>,
    gate: Mutex<Gate>,
    passes: watch::Sender<PassOutcome>,
}

impl LocalDataStore {
    pub fn new(ledger: Arc<dyn LedgerGateway>, metrics: Arc<CoordinatorMetrics>) -> Self {
        let (passes, _) = watch::channel(PassOutcome {
            completed: 0,
            result: Ok(ReloadReport::default()),
        });
        Self {
            ledger,
            metrics,
            view: Mutex::new(View::default()),
            gate: Mutex::new(Gate::default()),
            passes,
        }
    }

    /// Rebuild the record cache from the ledger.
    ///
    /// A call made while a pass is running waits for the next pass rather
    /// than sharing the running one, whose listing may predate the call.
    ///
    /// Per-record failures are logged and reported in
    /// [`ReloadReport::skipped`]; only a failure to list ids fails the
    /// reload, and then the previous cache is kept.
    pub async fn reload(self: &Arc<Self>) -> Result<ReloadReport, CoordinatorError> {
        let mut rx = self.passes.subscribe();
        let target = {
            let mut gate = lock(&self.gate);
            if gate.running {
                gate.rerun = true;
                gate.completed + 2
            } else {
                gate.running = true;
                tokio::spawn(Arc::clone(self).drive());
                gate.completed + 1
            }
        };

        let outcome = rx
            .wait_for(|pass| pass.completed >= target)
            .await
            .map_err(|_| CoordinatorError::LoadFailure("reload driver stopped".into()))?
            .clone();
        outcome.result.map_err(CoordinatorError::LoadFailure)
    }

    /// Whether a reload pass is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        lock(&self.gate).running
    }

    async fn drive(self: Arc<Self>) {
        let mut guard = DriverGuard { store: &self, armed: true };
        loop {
            let result = guard.store.run_pass().await;
            let again = {
                let mut gate = lock(&guard.store.gate);
                gate.completed += 1;
                guard.store.passes.send_replace(PassOutcome {
                    completed: gate.completed,
                    result,
                });
                if gate.rerun {
                    gate.rerun = false;
                    true
                } else {
                    gate.running = false;
                    false
                }
            };
            if !again {
                break;
            }
        }
        guard.armed = false;
    }

    async fn run_pass(&self) -> Result<ReloadReport, String> {
        let epoch = lock(&self.view).epoch;

        let ids = self.ledger.list_feature_ids().await.map_err(|e| {
            tracing::error!(error = %e, "listing feature ids failed");
            e.to_string()
        })?;

        let fetched = join_all(ids.iter().map(|id| self.ledger.get_feature_record(id))).await;
        let mut records = Vec::with_capacity(ids.len());
        let mut skipped = Vec::new();
        for (id, result) in ids.into_iter().zip(fetched) {
            match result {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(feature_id = %id, error = %e, "skipping record that failed to load");
                    skipped.push((id, e.to_string()));
                }
            }
        }

        self.metrics.reload_passes.inc();
        self.metrics.skipped_records.inc_by(skipped.len() as u64);

        let mut view = lock(&self.view);
        if view.epoch != epoch {
            tracing::debug!("discarding reload that started before the store was cleared");
            return Ok(ReloadReport {
                loaded: records.len(),
                skipped,
            });
        }

        // A lagging read must not hide a verification we already observed.
        let known: HashMap<&FeatureId, VoteTally> = view
            .records
            .iter()
            .filter(|r| r.is_verified())
            .map(|r| (&r.id, r.tally))
            .collect();
        for record in &mut records {
            if let Some(tally) = known.get(&record.id) {
                if !record.is_verified() {
                    record.tally = *tally;
                }
            }
        }

        let loaded = records.len();
        view.records = records;
        self.metrics.cached_records.set(loaded as i64);
        tracing::debug!(loaded, skipped = skipped.len(), "reload pass complete");
        Ok(ReloadReport { loaded, skipped })
    }

    /// Snapshot of the cached records, in ledger order.
    pub fn records(&self) -> Vec<FeatureRecord> {
        lock(&self.view).records.clone()
    }

    pub fn record(&self, id: &FeatureId) -> Option<FeatureRecord> {
        lock(&self.view).records.iter().find(|r| &r.id == id).cloned()
    }

    /// Session history, newest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        lock(&self.view).history.clone()
    }

    /// Current session epoch. Changes whenever the store is cleared.
    pub fn epoch(&self) -> u64 {
        lock(&self.view).epoch
    }

    /// Record an action taken during the session that began at `epoch`.
    ///
    /// Returns `false` and drops the entry if the store was cleared since,
    /// so an operation finishing late never lands in a later session's history.
    pub fn push_history(&self, epoch: u64, entry: HistoryEntry) -> bool {
        let mut view = lock(&self.view);
        if view.epoch != epoch {
            tracing::debug!(kind = entry.kind(), "dropping history entry from an ended session");
            return false;
        }
        view.history.insert(0, entry);
        true
    }

    pub fn stats(&self) -> DerivedStats {
        let view = lock(&self.view);
        DerivedStats::compute(&view.records, &view.history)
    }

    /// Cached records whose name or description contains `term`, ignoring case.
    pub fn search(&self, term: &str) -> Vec<FeatureRecord> {
        let view = lock(&self.view);
        if term.trim().is_empty() {
            return view.records.clone();
        }
        view.records
            .iter()
            .filter(|r| r.matches(term.trim()))
            .cloned()
            .collect()
    }

    /// Drop every cached record and history entry.
    pub fn clear(&self) {
        let mut view = lock(&self.view);
        view.epoch += 1;
        view.records.clear();
        view.history.clear();
        self.metrics.cached_records.set(0);
    }
}

/// Releases reload waiters if the driver task dies mid-pass.
struct DriverGuard<'a> {
    store: &'a LocalDataStore,
    armed: bool,
}

impl Drop for DriverGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut gate = lock(&self.store.gate);
        gate.completed += if gate.rerun { 2 } else { 1 };
        gate.running = false;
        gate.rerun = false;
        self.store.passes.send_replace(PassOutcome {
            completed: gate.completed,
            result: Err("reload task aborted".into()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhevote_gateway::GatewayError;
    use fhevote_nullables::{NullClock, NullLedger};
    use fhevote_types::{ContractAddress, EncryptedHandle, IdentityAddress, Timestamp};
    use proptest::prelude::*;

    fn creator() -> IdentityAddress {
        IdentityAddress::from_bytes([0x11; 20])
    }

    fn ledger() -> Arc<NullLedger> {
        Arc::new(NullLedger::new(
            ContractAddress::from_bytes([0xcc; 20]),
            creator(),
            Arc::new(NullClock::new(1_000)),
        ))
    }

    fn fid(raw: &str) -> FeatureId {
        FeatureId::new(raw).unwrap()
    }

    fn seed(ledger: &NullLedger, id: &str, name: &str) {
        ledger.seed_record(
            &fid(id),
            name,
            "",
            EncryptedHandle::new(id.as_bytes().to_vec()),
            creator(),
        );
    }

    fn store_over(ledger: &Arc<NullLedger>) -> Arc<LocalDataStore> {
        Arc::new(LocalDataStore::new(
            ledger.clone(),
            Arc::new(CoordinatorMetrics::new()),
        ))
    }

    fn record(n: u64, tally: VoteTally) -> FeatureRecord {
        FeatureRecord {
            id: fid(&format!("feature-{n}")),
            name: format!("feature {n}"),
            description: String::new(),
            encrypted_vote_handle: EncryptedHandle::new(n.to_be_bytes().to_vec()),
            public_value1: 0,
            public_value2: 0,
            creator: creator(),
            timestamp: Timestamp::new(n),
            tally,
        }
    }

    #[test]
    fn stats_count_only_revealed_votes() {
        let records = vec![
            record(1, VoteTally::Revealed(5)),
            record(2, VoteTally::Sealed),
            record(3, VoteTally::Revealed(7)),
        ];
        let stats = DerivedStats::compute(&records, &[]);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.verified, 2);
        assert_eq!(stats.total_votes, 12);
        assert_eq!(stats.history_len, 0);
    }

    proptest! {
        #[test]
        fn sealed_records_contribute_nothing(
            tallies in proptest::collection::vec(proptest::option::of(0u64..=u32::MAX as u64), 0..32)
        ) {
            let records: Vec<_> = tallies
                .iter()
                .enumerate()
                .map(|(i, t)| record(i as u64, t.map_or(VoteTally::Sealed, VoteTally::Revealed)))
                .collect();
            let expected: u64 = tallies.iter().flatten().sum();
            let stats = DerivedStats::compute(&records, &[]);
            prop_assert_eq!(stats.total_votes, expected);
            prop_assert_eq!(stats.verified, tallies.iter().filter(|t| t.is_some()).count());
        }
    }

    #[tokio::test]
    async fn reload_keeps_survivors_of_partial_failure() {
        let ledger = ledger();
        for (id, name) in [("a", "Alpha"), ("b", "Beta"), ("c", "Gamma")] {
            seed(&ledger, id, name);
        }
        ledger.break_record(&fid("b"));
        let store = store_over(&ledger);

        let report = store.reload().await.unwrap();
        assert_eq!(report.loaded, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, fid("b"));
        let names: Vec<_> = store.records().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["Alpha", "Gamma"]);
    }

    #[tokio::test]
    async fn listing_failure_keeps_previous_cache() {
        let ledger = ledger();
        seed(&ledger, "a", "Alpha");
        let store = store_over(&ledger);
        store.reload().await.unwrap();

        ledger.fail_listing(Some(GatewayError::Transport("rpc down".into())));
        let err = store.reload().await.unwrap_err();
        assert!(matches!(err, CoordinatorError::LoadFailure(_)));
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_reloads_coalesce_into_one_trailing_pass() {
        let ledger = ledger();
        seed(&ledger, "a", "Alpha");
        let store = store_over(&ledger);

        let (a, b, c) = tokio::join!(store.reload(), store.reload(), store.reload());
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(ledger.list_calls(), 2);
        assert!(!store.is_refreshing());
    }

    #[tokio::test]
    async fn sequential_reloads_each_run_a_pass() {
        let ledger = ledger();
        let store = store_over(&ledger);
        store.reload().await.unwrap();
        seed(&ledger, "a", "Alpha");
        store.reload().await.unwrap();
        assert_eq!(ledger.list_calls(), 2);
        assert_eq!(store.records().len(), 1);
    }

    #[test]
    fn history_is_newest_first() {
        let store = store_over(&ledger());
        for n in 1..=3 {
            let entry = HistoryEntry::Create {
                feature_name: format!("f{n}"),
                timestamp: Timestamp::new(n),
                vote_plaintext: n,
            };
            assert!(store.push_history(store.epoch(), entry));
        }
        let stamps: Vec<_> = store.history().iter().map(|h| h.timestamp().as_secs()).collect();
        assert_eq!(stamps, [3, 2, 1]);
        assert_eq!(store.stats().history_len, 3);
    }

    #[tokio::test]
    async fn search_matches_name_or_description_case_insensitively() {
        let ledger = ledger();
        ledger.seed_record(
            &fid("a"),
            "Dark Mode",
            "night theme",
            EncryptedHandle::new(b"a".to_vec()),
            creator(),
        );
        ledger.seed_record(
            &fid("b"),
            "Export",
            "CSV download",
            EncryptedHandle::new(b"b".to_vec()),
            creator(),
        );
        let store = store_over(&ledger);
        store.reload().await.unwrap();

        assert_eq!(store.search("dark").len(), 1);
        assert_eq!(store.search("csv")[0].name, "Export");
        assert_eq!(store.search("  ").len(), 2);
        assert!(store.search("nothing").is_empty());
    }

    #[tokio::test]
    async fn clear_discards_records_and_history() {
        let ledger = ledger();
        seed(&ledger, "a", "Alpha");
        let store = store_over(&ledger);
        store.reload().await.unwrap();
        let entry = HistoryEntry::Create {
            feature_name: "Alpha".into(),
            timestamp: Timestamp::new(1),
            vote_plaintext: 1,
        };
        store.push_history(store.epoch(), entry);

        store.clear();
        assert!(store.records().is_empty());
        assert!(store.history().is_empty());
        assert_eq!(store.stats(), DerivedStats::default());
    }

    #[test]
    fn history_from_before_a_clear_is_dropped() {
        let store = store_over(&ledger());
        let stale = store.epoch();
        store.clear();
        let kept = store.push_history(
            stale,
            HistoryEntry::Create {
                feature_name: "late".into(),
                timestamp: Timestamp::new(1),
                vote_plaintext: 1,
            },
        );
        assert!(!kept);
        assert!(store.history().is_empty());
    }

    #[tokio::test]
    async fn reload_updates_metrics() {
        let ledger = ledger();
        seed(&ledger, "a", "Alpha");
        seed(&ledger, "b", "Beta");
        ledger.break_record(&fid("a"));
        let metrics = Arc::new(CoordinatorMetrics::new());
        let store = Arc::new(LocalDataStore::new(ledger.clone(), metrics.clone()));

        store.reload().await.unwrap();
        assert_eq!(metrics.reload_passes.get(), 1);
        assert_eq!(metrics.skipped_records.get(), 1);
        assert_eq!(metrics.cached_records.get(), 1);
    }
}
