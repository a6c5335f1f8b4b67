//! Scenario harness.
//!
//! Drives deterministic fail→fix pairs through the real materializer and
//! gateway to exercise one enforcement dimension at a time:
//!
//! - authority: reviewer equals orchestrator, then a distinct reviewer
//! - integrity: `report.md` changed after its digest was asserted, then intact
//! - structure: `contract.json` removed, then intact
//!
//! A contradicted expectation is a [`HarnessError::ExpectationViolated`],
//! never an enforcement denial. The harness does not advance claim state;
//! with recording enabled, denied steps are appended to the rejection log.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::audit::AuditLog;
use crate::domain::{BoundProposal, GatewayError, RejectionEntry};
use crate::kernel::{CLASS_AUTHORITY, CLASS_INTEGRITY, CLASS_STRUCTURAL};
use crate::gateway::{Decision, EnforcementGateway};
use crate::metrics::METRICS;
use crate::run::layout::REPORT_FILE;
use crate::run::{Identities, ManifestMode, RunMaterializer, RunMember};

/// Errors that stop the harness.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("{scenario}/{step}: expected {expected}, kernel answered {actual} (run {run_id})")]
    ExpectationViolated {
        scenario: String,
        step: String,
        expected: String,
        actual: String,
        run_id: String,
    },

    #[error("failed to perturb run {run_id}: {source}")]
    Perturbation {
        run_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Deliberate damage applied to a run after it is fully materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Perturbation {
    None,
    /// Append to `path` after the manifest froze its digest.
    TamperAfterManifest { path: String },
    /// Delete a required member.
    OmitMember(RunMember),
}

impl Perturbation {
    fn apply(&self, run_dir: &Path) -> std::io::Result<()> {
        match self {
            Perturbation::None => Ok(()),
            Perturbation::TamperAfterManifest { path } => {
                let mut file = std::fs::OpenOptions::new()
                    .append(true)
                    .open(run_dir.join(path))?;
                file.write_all(b"\nTAMPER\n")
            }
            Perturbation::OmitMember(member) => std::fs::remove_file(member.path_in(run_dir)),
        }
    }
}

/// What a step must produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    Allow,
    /// Denied, with `class` among the failure classes when given.
    Deny { class: Option<String> },
}

impl Expectation {
    fn deny(class: &str) -> Self {
        Expectation::Deny {
            class: Some(class.to_string()),
        }
    }

    fn describe(&self) -> String {
        match self {
            Expectation::Allow => "allow".to_string(),
            Expectation::Deny { class: Some(c) } => format!("deny ({c})"),
            Expectation::Deny { class: None } => "deny".to_string(),
        }
    }
}

/// One attempt within a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioStep {
    pub label: String,
    pub identities: Identities,
    pub manifest: ManifestMode,
    pub perturbation: Perturbation,
    pub expect: Expectation,
}

/// An ordered fail→fix sequence.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub steps: Vec<ScenarioStep>,
}

/// Authority, integrity and structure fail→fix pairs.
pub fn standard_scenarios() -> Vec<Scenario> {
    let independent = Identities::humans("alice", "bob");
    let asserted_report = ManifestMode::Asserted(vec![REPORT_FILE.to_string()]);
    vec![
        Scenario {
            name: "authority".to_string(),
            steps: vec![
                ScenarioStep {
                    label: "A1 authority fail (self-approval)".to_string(),
                    identities: Identities::humans("alice", "alice"),
                    manifest: ManifestMode::Placeholder,
                    perturbation: Perturbation::None,
                    expect: Expectation::deny(CLASS_AUTHORITY),
                },
                ScenarioStep {
                    label: "A2 authority fix (separate reviewer)".to_string(),
                    identities: independent.clone(),
                    manifest: ManifestMode::Placeholder,
                    perturbation: Perturbation::None,
                    expect: Expectation::Allow,
                },
            ],
        },
        Scenario {
            name: "integrity".to_string(),
            steps: vec![
                ScenarioStep {
                    label: "B1 integrity fail (report changed after manifest)".to_string(),
                    identities: independent.clone(),
                    manifest: asserted_report.clone(),
                    perturbation: Perturbation::TamperAfterManifest {
                        path: REPORT_FILE.to_string(),
                    },
                    expect: Expectation::deny(CLASS_INTEGRITY),
                },
                ScenarioStep {
                    label: "B2 integrity fix (digests match)".to_string(),
                    identities: independent.clone(),
                    manifest: asserted_report,
                    perturbation: Perturbation::None,
                    expect: Expectation::Allow,
                },
            ],
        },
        Scenario {
            name: "structure".to_string(),
            steps: vec![
                ScenarioStep {
                    label: "C1 structure fail (contract.json missing)".to_string(),
                    identities: independent.clone(),
                    manifest: ManifestMode::Placeholder,
                    perturbation: Perturbation::OmitMember(RunMember::Contract),
                    expect: Expectation::deny(CLASS_STRUCTURAL),
                },
                ScenarioStep {
                    label: "C2 structure fix (all members present)".to_string(),
                    identities: independent,
                    manifest: ManifestMode::Placeholder,
                    perturbation: Perturbation::None,
                    expect: Expectation::Allow,
                },
            ],
        },
    ]
}

/// Result of one passed step.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub scenario: String,
    pub label: String,
    pub run_id: String,
    pub run_dir: PathBuf,
    pub decision: Decision,
    pub recorded: bool,
}

impl StepReport {
    pub fn report_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("== {} ==", self.label)];
        lines.extend(self.decision.summary_lines());
        lines.push(format!(
            "COMMIT: {} (run_id={})",
            if self.decision.allowed { "allowed" } else { "blocked" },
            self.run_id
        ));
        lines
    }
}

/// Runs scenarios against a gateway.
#[derive(Debug, Clone)]
pub struct Showcase {
    gateway: EnforcementGateway,
    materializer: RunMaterializer,
    runs_dir: PathBuf,
    /// Stage that must also pass for an allow to count (e.g.
    /// `publication-commit`).
    require_stage: Option<String>,
}

impl Showcase {
    pub fn new(
        gateway: EnforcementGateway,
        materializer: RunMaterializer,
        runs_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            gateway,
            materializer,
            runs_dir: runs_dir.into(),
            require_stage: None,
        }
    }

    pub fn require_stage(mut self, stage_id: impl Into<String>) -> Self {
        self.require_stage = Some(stage_id.into());
        self
    }

    fn committed(&self, decision: &Decision) -> bool {
        decision.allowed
            && self.require_stage.as_ref().map_or(true, |required| {
                decision
                    .stages
                    .iter()
                    .any(|s| &s.stage_id == required && s.passed)
            })
    }

    /// Run every step of every scenario in order, stopping at the first
    /// contradicted expectation.
    pub async fn run(
        &self,
        bound: &BoundProposal,
        scenarios: &[Scenario],
        mut audit: Option<&mut AuditLog>,
    ) -> Result<Vec<StepReport>, HarnessError> {
        let mut reports = Vec::new();
        for scenario in scenarios {
            for step in &scenario.steps {
                let report = self
                    .run_step(&scenario.name, step, bound, audit.as_deref_mut())
                    .await?;
                reports.push(report);
            }
        }
        Ok(reports)
    }

    async fn run_step(
        &self,
        scenario: &str,
        step: &ScenarioStep,
        bound: &BoundProposal,
        audit: Option<&mut AuditLog>,
    ) -> Result<StepReport, HarnessError> {
        let run = self
            .materializer
            .with_manifest(step.manifest.clone())
            .create_run(&self.runs_dir, bound, &step.identities)?;

        step.perturbation
            .apply(&run.run_dir)
            .map_err(|source| HarnessError::Perturbation {
                run_id: run.run_id.clone(),
                source,
            })?;

        let mut decision = self.gateway.decide(&run.run_dir, &run.context).await?;
        decision.allowed = self.committed(&decision);

        let violated = |actual: &str| HarnessError::ExpectationViolated {
            scenario: scenario.to_string(),
            step: step.label.clone(),
            expected: step.expect.describe(),
            actual: actual.to_string(),
            run_id: run.run_id.clone(),
        };

        match (&step.expect, decision.allowed) {
            (Expectation::Allow, true) => {}
            (Expectation::Allow, false) => {
                return Err(violated(&format!(
                    "deny ({})",
                    decision.failure_classes().join(", ")
                )))
            }
            (Expectation::Deny { .. }, true) => return Err(violated("allow")),
            (Expectation::Deny { class }, false) => {
                if let Some(class) = class {
                    let classes = decision.failure_classes();
                    if !classes.contains(&class.as_str()) {
                        return Err(violated(&format!("deny ({})", classes.join(", "))));
                    }
                }
            }
        }

        if !decision.allowed {
            METRICS.inc_denials();
        }

        let mut recorded = false;
        if let Some(audit) = audit {
            if !decision.allowed {
                audit.append_rejection(RejectionEntry::denied(
                    bound,
                    &run.run_id,
                    decision.stages.clone(),
                ))?;
                recorded = true;
            }
        }

        Ok(StepReport {
            scenario: scenario.to_string(),
            label: step.label.clone(),
            run_id: run.run_id,
            run_dir: run.run_dir,
            decision,
            recorded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Proposal, StageResult, PROPOSAL_TYPE};
    use crate::fakes::{InspectingKernel, ScriptedKernel};
    use crate::kernel::{DecisionKernel, KernelVerdict, STAGE_PUBLICATION};
    use crate::run::CONTRACT_VERSION;
    use std::sync::Arc;

    fn bound() -> BoundProposal {
        BoundProposal::new(Proposal {
            proposal_id: Some("proposal-001".to_string()),
            kind: PROPOSAL_TYPE.to_string(),
            claim_id: "claim-001".to_string(),
            evidence_id: "ev-003-contradicted".to_string(),
            from: "supported".into(),
            to: "contradicted".into(),
            contract_version: CONTRACT_VERSION.to_string(),
            authority_requirements: Vec::new(),
        })
        .unwrap()
    }

    fn showcase(kernel: Arc<dyn DecisionKernel>, runs: &Path) -> Showcase {
        Showcase::new(
            EnforcementGateway::new(kernel, CONTRACT_VERSION),
            RunMaterializer::default(),
            runs,
        )
    }

    #[test]
    fn test_standard_scenarios_are_fail_then_fix() {
        let scenarios = standard_scenarios();
        assert_eq!(scenarios.len(), 3);
        for scenario in &scenarios {
            assert_eq!(scenario.steps.len(), 2);
            assert!(matches!(scenario.steps[0].expect, Expectation::Deny { .. }));
            assert_eq!(scenario.steps[1].expect, Expectation::Allow);
        }
    }

    #[tokio::test]
    async fn test_standard_scenarios_pass_against_inspecting_kernel() {
        let dir = tempfile::tempdir().unwrap();
        let reports = showcase(Arc::new(InspectingKernel::default()), dir.path())
            .require_stage(STAGE_PUBLICATION)
            .run(&bound(), &standard_scenarios(), None)
            .await
            .unwrap();

        assert_eq!(reports.len(), 6);
        let allowed: Vec<bool> = reports.iter().map(|r| r.decision.allowed).collect();
        assert_eq!(allowed, vec![false, true, false, true, false, true]);
        assert!(reports.iter().all(|r| !r.recorded));
    }

    #[tokio::test]
    async fn test_denials_counted_without_recording() {
        let dir = tempfile::tempdir().unwrap();
        let before = METRICS.denials();
        showcase(Arc::new(InspectingKernel::default()), dir.path())
            .run(&bound(), &standard_scenarios(), None)
            .await
            .unwrap();
        // Other tests share the global counters; they only ever add.
        assert!(METRICS.denials() >= before + 3);
    }

    #[tokio::test]
    async fn test_unexpected_allow_is_expectation_violation() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = Arc::new(ScriptedKernel::new());
        kernel.push_outcome(true);
        let err = showcase(kernel, dir.path())
            .run(&bound(), &standard_scenarios()[..1], None)
            .await
            .unwrap_err();
        match err {
            HarnessError::ExpectationViolated {
                scenario, actual, ..
            } => {
                assert_eq!(scenario, "authority");
                assert_eq!(actual, "allow");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_wrong_failure_class_is_expectation_violation() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = Arc::new(ScriptedKernel::new());
        kernel.push(KernelVerdict::with_flag(
            vec![StageResult::fail("integrity", "integrity", "digest mismatch")],
            false,
        ));
        let err = showcase(kernel, dir.path())
            .run(&bound(), &standard_scenarios()[..1], None)
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::ExpectationViolated { .. }));
    }

    #[tokio::test]
    async fn test_required_stage_missing_blocks_commit() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = Arc::new(ScriptedKernel::new());
        kernel.push(KernelVerdict::with_flag(vec![StageResult::pass("independence")], true));
        let scenario = Scenario {
            name: "publication".to_string(),
            steps: vec![ScenarioStep {
                label: "P1".to_string(),
                identities: Identities::humans("alice", "bob"),
                manifest: ManifestMode::Placeholder,
                perturbation: Perturbation::None,
                expect: Expectation::Deny { class: None },
            }],
        };
        let reports = showcase(kernel, dir.path())
            .require_stage(STAGE_PUBLICATION)
            .run(&bound(), &[scenario], None)
            .await
            .unwrap();
        assert!(!reports[0].decision.allowed);
    }

    #[tokio::test]
    async fn test_recording_logs_denials_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut audit = AuditLog::open(
            dir.path().join("transition-log.json"),
            dir.path().join("rejections-log.json"),
        )
        .unwrap();
        let reports = showcase(Arc::new(InspectingKernel::default()), &dir.path().join("runs"))
            .run(&bound(), &standard_scenarios(), Some(&mut audit))
            .await
            .unwrap();

        assert_eq!(reports.iter().filter(|r| r.recorded).count(), 3);
        assert_eq!(audit.rejections().len(), 3);
        assert!(audit.transitions().is_empty());
    }
}
