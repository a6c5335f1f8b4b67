//! Global atomic counters for gateway observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a batch).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations and no locking.
pub struct Metrics {
    runs_materialized: AtomicU64,
    commits: AtomicU64,
    denials: AtomicU64,
    policy_rejections: AtomicU64,
    skips: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            runs_materialized: AtomicU64::new(0),
            commits: AtomicU64::new(0),
            denials: AtomicU64::new(0),
            policy_rejections: AtomicU64::new(0),
            skips: AtomicU64::new(0),
        }
    }

    pub fn inc_runs_materialized(&self) {
        self.runs_materialized.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_materialized", "counter incremented");
    }

    pub fn inc_commits(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "commits", "counter incremented");
    }

    pub fn inc_denials(&self) {
        self.denials.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "denials", "counter incremented");
    }

    pub fn inc_policy_rejections(&self) {
        self.policy_rejections.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "policy_rejections", "counter incremented");
    }

    pub fn inc_skips(&self) {
        self.skips.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "skips", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call this at natural boundaries (end of a batch or showcase) rather
    /// than on every increment.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            runs_materialized = self.runs_materialized(),
            commits = self.commits(),
            denials = self.denials(),
            policy_rejections = self.policy_rejections(),
            skips = self.skips(),
        );
    }

    pub fn runs_materialized(&self) -> u64 {
        self.runs_materialized.load(Ordering::Relaxed)
    }

    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    pub fn denials(&self) -> u64 {
        self.denials.load(Ordering::Relaxed)
    }

    pub fn policy_rejections(&self) -> u64 {
        self.policy_rejections.load(Ordering::Relaxed)
    }

    pub fn skips(&self) -> u64 {
        self.skips.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.runs_materialized.store(0, Ordering::Relaxed);
        self.commits.store(0, Ordering::Relaxed);
        self.denials.store(0, Ordering::Relaxed);
        self.policy_rejections.store(0, Ordering::Relaxed);
        self.skips.store(0, Ordering::Relaxed);
    }
}
