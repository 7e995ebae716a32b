//! Prometheus metrics for the coordinator.
//!
//! [`CoordinatorMetrics`] owns a dedicated [`Registry`] so several sessions
//! in one process never collide on metric names. [`CoordinatorMetrics::encode_text`]
//! renders it in the Prometheus text exposition format.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, IntCounter,
    IntGauge, Opts, Registry, TextEncoder,
};

pub struct CoordinatorMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Feature records whose creation transaction confirmed.
    pub features_created: IntCounter,
    /// Reveals that decrypted and committed a verification.
    pub reveals_verified: IntCounter,
    /// Reveals answered from an already-verified record.
    pub reveals_cached: IntCounter,
    /// Verifications lost to another party.
    pub verification_conflicts: IntCounter,
    /// Operations that ended in a terminal failure.
    pub failed_operations: IntCounter,
    /// Completed reload passes.
    pub reload_passes: IntCounter,
    /// Records dropped from a reload because their fetch failed.
    pub skipped_records: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Records currently in the local cache.
    pub cached_records: IntGauge,
}

impl CoordinatorMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let features_created = register_int_counter_with_registry!(
            Opts::new(
                "fhevote_features_created_total",
                "Feature records created and confirmed"
            ),
            registry
        )
        .expect("failed to register features_created counter");

        let reveals_verified = register_int_counter_with_registry!(
            Opts::new(
                "fhevote_reveals_verified_total",
                "Reveals that committed a verified decryption"
            ),
            registry
        )
        .expect("failed to register reveals_verified counter");

        let reveals_cached = register_int_counter_with_registry!(
            Opts::new(
                "fhevote_reveals_cached_total",
                "Reveals answered from an already-verified record"
            ),
            registry
        )
        .expect("failed to register reveals_cached counter");

        let verification_conflicts = register_int_counter_with_registry!(
            Opts::new(
                "fhevote_verification_conflicts_total",
                "Verifications already committed by another party"
            ),
            registry
        )
        .expect("failed to register verification_conflicts counter");

        let failed_operations = register_int_counter_with_registry!(
            Opts::new(
                "fhevote_failed_operations_total",
                "Coordinator operations that failed"
            ),
            registry
        )
        .expect("failed to register failed_operations counter");

        let reload_passes = register_int_counter_with_registry!(
            Opts::new("fhevote_reload_passes_total", "Completed reload passes"),
            registry
        )
        .expect("failed to register reload_passes counter");

        let skipped_records = register_int_counter_with_registry!(
            Opts::new(
                "fhevote_skipped_records_total",
                "Records skipped during reload because their fetch failed"
            ),
            registry
        )
        .expect("failed to register skipped_records counter");

        let cached_records = register_int_gauge_with_registry!(
            Opts::new("fhevote_cached_records", "Records in the local cache"),
            registry
        )
        .expect("failed to register cached_records gauge");

        Self {
            registry,
            features_created,
            reveals_verified,
            reveals_cached,
            verification_conflicts,
            failed_operations,
            reload_passes,
            skipped_records,
            cached_records,
        }
    }

    /// Render every metric in the Prometheus text format.
    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
            tracing::warn!(error = %e, "failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for CoordinatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}
