//! Structured observability hooks for the transition gateway.
//!
//! This module provides:
//! - Run-scoped tracing spans via `RunSpan` RAII guard
//! - Emission functions for gateway events: run materialized, kernel
//!   resolved, decision, commit, denial, policy rejection, skip
//!
//! Events are emitted at `info!` level (configurable via `RUST_LOG`).
//! For JSON output, pass `--json` to the CLI.

use std::path::Path;

use tracing::{info, warn};

use crate::gateway::DecisionBasis;

/// RAII guard that enters a run-scoped tracing span for the duration of an
/// attempt.
///
/// # Example
///
/// ```ignore
/// let _span = RunSpan::enter("RUN-20260218T090507Z-000042");
/// // Every event inside the attempt carries run_id.
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    /// Create and enter a span tagged with the run_id.
    pub fn enter(run_id: &str) -> Self {
        let span = tracing::info_span!("claimgate.run", run_id = %run_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a run directory was fully written.
pub fn emit_run_materialized(run_id: &str, proposal_hash: &str, run_dir: &Path) {
    info!(
        event = "run.materialized",
        run_id = %run_id,
        proposal_hash = %proposal_hash,
        run_dir = %run_dir.display(),
    );
}

/// Emit event: kernel executable resolved and handshake accepted.
pub fn emit_kernel_resolved(executable: &str, name: &str, protocol_version: u32) {
    info!(
        event = "kernel.resolved",
        executable = %executable,
        kernel = %name,
        protocol_version = protocol_version,
    );
}

/// Emit event: the gateway derived an outcome for a run.
pub fn emit_decision(run_dir: &str, allowed: bool, basis: DecisionBasis, failing_stages: usize) {
    info!(
        event = "gateway.decision",
        run_dir = %run_dir,
        allowed = allowed,
        basis = ?basis,
        failing_stages = failing_stages,
    );
}

/// Emit event: a transition was committed to the log.
pub fn emit_transition_committed(claim_id: &str, from: &str, to: &str, run_id: &str) {
    info!(
        event = "transition.committed",
        claim_id = %claim_id,
        from = %from,
        to = %to,
        run_id = %run_id,
    );
}

/// Emit event: the kernel denied a run (warning level).
pub fn emit_transition_denied(claim_id: &str, from: &str, to: &str, run_id: &str, classes: &[&str]) {
    warn!(
        event = "transition.denied",
        claim_id = %claim_id,
        from = %from,
        to = %to,
        run_id = %run_id,
        failure_classes = ?classes,
    );
}

/// Emit event: the rule table does not contain the transition.
pub fn emit_policy_rejection(claim_id: &str, from: &str, to: &str) {
    warn!(event = "transition.policy_rejected", claim_id = %claim_id, from = %from, to = %to);
}

/// Emit event: proposal entry skipped because its `from` is stale.
pub fn emit_proposal_skipped(evidence_id: &str, from: &str, current: &str) {
    info!(
        event = "proposal.skipped",
        evidence_id = %evidence_id,
        from = %from,
        current_state = %current,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_create() {
        let _span = RunSpan::enter("RUN-test");
    }
}
