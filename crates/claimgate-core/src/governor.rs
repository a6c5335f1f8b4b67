//! Transition governor: drives proposal entries through
//! binder → run materializer → enforcement gateway → state machine + audit log.
//!
//! Strictly sequential. Entries are attempted in document order and the
//! claim state is re-read before every entry. Kernel and configuration
//! failures abort the batch; binding and materialization failures only end
//! the current entry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{warn, Instrument};

use crate::audit::AuditLog;
use crate::binder::{bind, BindOutcome, BindRequest};
use crate::documents::{load_evidence, ProjectLayout};
use crate::domain::{
    Claim, ClaimState, GatewayError, LogEntry, ProposalDocument, ProposedTransition,
    RejectionEntry, Result, RuleTable, Transition,
};
use crate::gateway::{Decision, EnforcementGateway};
use crate::lifecycle;
use crate::metrics::METRICS;
use crate::obs::{self, RunSpan};
use crate::run::{Identities, RunMaterializer};

/// Identities to try, in order, for each evidence id.
///
/// The first allowed attempt commits; later attempts are not made.
#[derive(Debug, Clone)]
pub struct AttemptPlan {
    default: Identities,
    overrides: HashMap<String, Vec<Identities>>,
}

impl AttemptPlan {
    /// One attempt per entry with `identities`.
    pub fn single(identities: Identities) -> Self {
        Self {
            default: identities,
            overrides: HashMap::new(),
        }
    }

    /// Try `attempts` in order for `evidence_id` instead of the default.
    pub fn with_attempts(mut self, evidence_id: impl Into<String>, attempts: Vec<Identities>) -> Self {
        self.overrides.insert(evidence_id.into(), attempts);
        self
    }

    pub fn attempts_for(&self, evidence_id: &str) -> Vec<Identities> {
        self.overrides
            .get(evidence_id)
            .filter(|a| !a.is_empty())
            .cloned()
            .unwrap_or_else(|| vec![self.default.clone()])
    }
}

/// What happened to one proposal entry or attempt.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// `from` was not the current state.
    Skipped {
        evidence_id: String,
        transition: Transition,
        current: ClaimState,
    },
    /// The rule table does not declare the transition.
    Rejected {
        evidence_id: String,
        transition: Transition,
    },
    /// The kernel denied one attempt.
    Denied {
        evidence_id: String,
        transition: Transition,
        run_id: String,
        attempt: usize,
        decision: Decision,
    },
    /// The transition was logged and applied.
    Committed {
        evidence_id: String,
        transition: Transition,
        run_id: String,
        attempt: usize,
    },
    /// The entry could not be processed (binding, document or run failure).
    Failed { evidence_id: String, error: String },
}

impl Outcome {
    /// Console lines: `[SKIP]`, `[REJECT]`, `[DENY]`, `[OK]`, `[ERROR]`.
    pub fn report_lines(&self) -> Vec<String> {
        match self {
            Outcome::Skipped {
                evidence_id,
                transition,
                current,
            } => vec![format!(
                "[SKIP] {evidence_id} ({transition}) does not match current state {current}"
            )],
            Outcome::Rejected {
                evidence_id,
                transition,
            } => vec![format!(
                "[REJECT] Transition {transition} not allowed by rules ({evidence_id})"
            )],
            Outcome::Denied {
                evidence_id,
                transition,
                run_id,
                attempt,
                decision,
            } => {
                let mut lines = vec![format!(
                    "[DENY] {transition} via {evidence_id} (attempt {attempt}, run {run_id})"
                )];
                lines.extend(
                    decision
                        .failing_stages()
                        .flat_map(|s| s.summary_lines())
                        .map(|l| format!("        {l}")),
                );
                lines
            }
            Outcome::Committed {
                evidence_id,
                transition,
                run_id,
                ..
            } => vec![format!("[OK] {transition} via {evidence_id} (run {run_id})")],
            Outcome::Failed { evidence_id, error } => {
                vec![format!("[ERROR] {evidence_id}: {error}")]
            }
        }
    }
}

/// Result of one batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub initial: Claim,
    pub claim: Claim,
    pub outcomes: Vec<Outcome>,
}

impl BatchReport {
    pub fn committed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, Outcome::Committed { .. }))
            .count()
    }

    pub fn denied(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, Outcome::Denied { .. }))
            .count()
    }
}

/// Sequential driver for proposal batches.
#[derive(Debug, Clone)]
pub struct Governor {
    layout: ProjectLayout,
    gateway: EnforcementGateway,
    materializer: RunMaterializer,
    plan: AttemptPlan,
}

impl Governor {
    pub fn new(
        layout: ProjectLayout,
        gateway: EnforcementGateway,
        materializer: RunMaterializer,
        plan: AttemptPlan,
    ) -> Self {
        Self {
            layout,
            gateway,
            materializer,
            plan,
        }
    }

    pub fn runs_dir(&self) -> &Path {
        &self.layout.runs
    }

    /// Process every entry of every proposal document, in order.
    pub async fn run_batch(
        &self,
        claim: Claim,
        rules: &RuleTable,
        proposals: &[(PathBuf, ProposalDocument)],
        audit: &mut AuditLog,
    ) -> Result<BatchReport> {
        let initial = claim.clone();
        let mut claim = claim;
        let mut outcomes = Vec::new();

        for (_, document) in proposals {
            for entry in &document.transitions {
                claim = self
                    .process_entry(claim, rules, document, entry, audit, &mut outcomes)
                    .await?;
            }
        }

        Ok(BatchReport {
            initial,
            claim,
            outcomes,
        })
    }

    async fn process_entry(
        &self,
        claim: Claim,
        rules: &RuleTable,
        document: &ProposalDocument,
        entry: &ProposedTransition,
        audit: &mut AuditLog,
        outcomes: &mut Vec<Outcome>,
    ) -> Result<Claim> {
        let evidence_id = entry.evidence_id.as_str();
        let transition = entry.transition();
        let failed = |error: &GatewayError| Outcome::Failed {
            evidence_id: evidence_id.to_string(),
            error: error.to_string(),
        };

        let evidence = match load_evidence(&self.layout, evidence_id) {
            Ok(ev) => ev,
            Err(e) => {
                warn!(evidence_id = %evidence_id, error = %e, "evidence could not be loaded");
                outcomes.push(failed(&e));
                return Ok(claim);
            }
        };

        let bound = match bind(BindRequest {
            claim: &claim,
            rules,
            document,
            entry,
            evidence: &evidence,
            default_contract_version: self.gateway.contract_version(),
        }) {
            Ok(BindOutcome::Bound(bound)) => bound,
            Ok(BindOutcome::Stale) => {
                METRICS.inc_skips();
                obs::emit_proposal_skipped(
                    evidence_id,
                    transition.from.as_str(),
                    claim.current_state.as_str(),
                );
                outcomes.push(Outcome::Skipped {
                    evidence_id: evidence_id.to_string(),
                    transition,
                    current: claim.current_state.clone(),
                });
                return Ok(claim);
            }
            Err(GatewayError::PolicyRejection { .. }) => {
                METRICS.inc_policy_rejections();
                obs::emit_policy_rejection(
                    &claim.claim_id,
                    transition.from.as_str(),
                    transition.to.as_str(),
                );
                audit.append_rejection(RejectionEntry::policy(
                    &claim.claim_id,
                    evidence_id,
                    document.proposal_id.clone(),
                    &transition,
                ))?;
                outcomes.push(Outcome::Rejected {
                    evidence_id: evidence_id.to_string(),
                    transition,
                });
                return Ok(claim);
            }
            Err(e) if e.aborts_batch() => return Err(e),
            Err(e) => {
                warn!(evidence_id = %evidence_id, error = %e, "proposal entry failed to bind");
                outcomes.push(failed(&e));
                return Ok(claim);
            }
        };

        for (index, identities) in self.plan.attempts_for(evidence_id).into_iter().enumerate() {
            let attempt = index + 1;
            let run = match self
                .materializer
                .create_run(&self.layout.runs, &bound, &identities)
            {
                Ok(run) => run,
                Err(e) => {
                    warn!(evidence_id = %evidence_id, error = %e, "run materialization failed");
                    outcomes.push(failed(&e));
                    return Ok(claim);
                }
            };

            let span = tracing::info_span!("claimgate.run", run_id = %run.run_id);
            let decision = self
                .gateway
                .decide(&run.run_dir, &run.context)
                .instrument(span)
                .await?;

            let _span = RunSpan::enter(&run.run_id);
            if !decision.allowed {
                METRICS.inc_denials();
                obs::emit_transition_denied(
                    &claim.claim_id,
                    transition.from.as_str(),
                    transition.to.as_str(),
                    &run.run_id,
                    &decision.failure_classes(),
                );
                audit.append_rejection(RejectionEntry::denied(
                    &bound,
                    &run.run_id,
                    decision.stages.clone(),
                ))?;
                outcomes.push(Outcome::Denied {
                    evidence_id: evidence_id.to_string(),
                    transition: transition.clone(),
                    run_id: run.run_id,
                    attempt,
                    decision,
                });
                continue;
            }

            audit.append_transition(LogEntry::committed(&bound, &run.run_id))?;
            let advanced = lifecycle::apply(&claim, &transition.to);
            METRICS.inc_commits();
            obs::emit_transition_committed(
                &claim.claim_id,
                transition.from.as_str(),
                transition.to.as_str(),
                &run.run_id,
            );
            outcomes.push(Outcome::Committed {
                evidence_id: evidence_id.to_string(),
                transition,
                run_id: run.run_id,
                attempt,
            });
            return Ok(advanced);
        }

        Ok(claim)
    }
}
