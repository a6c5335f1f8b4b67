//! In-process decision kernels (testing and demos).
//!
//! - `ScriptedKernel`: replays a queue of prepared verdicts and records calls
//! - `InspectingKernel`: actually checks run structure, reviewer independence
//!   and `SHA256SUMS.txt` integrity, answering in either protocol shape

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{GatewayError, Result, StageResult};
use crate::kernel::{
    DecisionKernel, KernelVerdict, CLASS_AUTHORITY, CLASS_INTEGRITY, CLASS_PUBLICATION,
    CLASS_STRUCTURAL, STAGE_INDEPENDENCE, STAGE_INTEGRITY, STAGE_PUBLICATION, STAGE_RUN_STRUCTURE,
};
use crate::run::layout::{ContractDescriptor, CONTRACT_FILE};
use crate::run::{missing_members, IntegrityManifest, RunContext};

// ---------------------------------------------------------------------------
// ScriptedKernel
// ---------------------------------------------------------------------------

/// One recorded `evaluate` call.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelCall {
    pub run_dir: PathBuf,
    pub expected_contract_version: String,
    pub context: RunContext,
}

#[derive(Debug)]
enum Step {
    Verdict(KernelVerdict),
    Failure(String),
}

/// Kernel answering from a prepared queue. An exhausted queue is a protocol
/// error.
#[derive(Debug, Default)]
pub struct ScriptedKernel {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<KernelCall>>,
}

impl ScriptedKernel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, verdict: KernelVerdict) -> &Self {
        self.steps.lock().unwrap().push_back(Step::Verdict(verdict));
        self
    }

    /// Queue an allow (`true`) or deny (`false`) with a single stage.
    pub fn push_outcome(&self, allowed: bool) -> &Self {
        let stage = if allowed {
            StageResult::pass(STAGE_INDEPENDENCE)
        } else {
            StageResult::fail(STAGE_INDEPENDENCE, CLASS_AUTHORITY, "scripted denial")
        };
        self.push(KernelVerdict::with_flag(vec![stage], allowed))
    }

    /// Queue a kernel process failure.
    pub fn push_failure(&self, message: impl Into<String>) -> &Self {
        self.steps
            .lock()
            .unwrap()
            .push_back(Step::Failure(message.into()));
        self
    }

    pub fn calls(&self) -> Vec<KernelCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.steps.lock().unwrap().len()
    }
}

#[async_trait]
impl DecisionKernel for ScriptedKernel {
    async fn evaluate(
        &self,
        run_dir: &Path,
        expected_contract_version: &str,
        context: &RunContext,
    ) -> Result<KernelVerdict> {
        self.calls.lock().unwrap().push(KernelCall {
            run_dir: run_dir.to_path_buf(),
            expected_contract_version: expected_contract_version.to_string(),
            context: context.clone(),
        });
        match self.steps.lock().unwrap().pop_front() {
            Some(Step::Verdict(verdict)) => Ok(verdict),
            Some(Step::Failure(message)) => Err(GatewayError::KernelFailure(message)),
            None => Err(GatewayError::KernelProtocol(
                "scripted kernel has no verdict left".to_string(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// InspectingKernel
// ---------------------------------------------------------------------------

/// Answer shape of [`InspectingKernel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictShape {
    /// Stage list only.
    StagesOnly,
    /// Stage list plus `commit_allowed`.
    WithFlag,
}

/// Kernel that inspects the run directory the way a real kernel would.
#[derive(Debug, Clone)]
pub struct InspectingKernel {
    shape: VerdictShape,
    engine_version: String,
}

impl Default for InspectingKernel {
    fn default() -> Self {
        Self::new(VerdictShape::WithFlag)
    }
}

impl InspectingKernel {
    pub fn new(shape: VerdictShape) -> Self {
        Self {
            shape,
            engine_version: format!("inspecting-kernel/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    fn stamp(&self, mut stage: StageResult) -> StageResult {
        stage.checked_at_utc = Some(Utc::now().to_rfc3339());
        stage.engine_version = Some(self.engine_version.clone());
        stage
    }

    fn check_structure(run_dir: &Path, expected_contract_version: &str) -> StageResult {
        let missing = missing_members(run_dir);
        if !missing.is_empty() {
            let mut stage = StageResult::fail(
                STAGE_RUN_STRUCTURE,
                CLASS_STRUCTURAL,
                format!("missing required member {}", missing[0].relative_path()),
            );
            stage.messages.extend(
                missing[1..]
                    .iter()
                    .map(|m| format!("missing required member {}", m.relative_path())),
            );
            return stage;
        }

        let descriptor = std::fs::read(run_dir.join(CONTRACT_FILE))
            .ok()
            .and_then(|bytes| serde_json::from_slice::<ContractDescriptor>(&bytes).ok());
        match descriptor {
            Some(d) if d.contract_version == expected_contract_version => {
                StageResult::pass(STAGE_RUN_STRUCTURE)
            }
            Some(d) => StageResult::fail(
                STAGE_RUN_STRUCTURE,
                CLASS_STRUCTURAL,
                format!(
                    "contract version {} does not match expected {expected_contract_version}",
                    d.contract_version
                ),
            ),
            None => StageResult::fail(
                STAGE_RUN_STRUCTURE,
                CLASS_STRUCTURAL,
                format!("{CONTRACT_FILE} is not a valid contract descriptor"),
            ),
        }
    }

    fn check_independence(context: &RunContext) -> StageResult {
        let ids = &context.identities;
        if ids.is_self_approval() && !ids.self_approval_override {
            return StageResult::fail(
                STAGE_INDEPENDENCE,
                CLASS_AUTHORITY,
                format!(
                    "reviewer '{}' is also the orchestrator",
                    ids.reviewer.id
                ),
            );
        }
        StageResult::pass(STAGE_INDEPENDENCE)
    }

    fn check_integrity(run_dir: &Path) -> StageResult {
        let manifest = match IntegrityManifest::read(run_dir) {
            Ok(m) => m,
            Err(e) => {
                return StageResult::fail(
                    STAGE_INTEGRITY,
                    CLASS_INTEGRITY,
                    format!("integrity manifest unreadable: {e}"),
                )
            }
        };
        let mismatches = manifest.verify(run_dir);
        if mismatches.is_empty() {
            return StageResult::pass(STAGE_INTEGRITY);
        }
        StageResult {
            stage_id: STAGE_INTEGRITY.to_string(),
            passed: false,
            failure_classes: vec![CLASS_INTEGRITY.to_string()],
            messages: mismatches
                .iter()
                .map(|m| match &m.actual {
                    Some(actual) => format!(
                        "{}: expected {}, found {}",
                        m.path, m.expected, actual
                    ),
                    None => format!("{}: asserted file is missing", m.path),
                })
                .collect(),
            checked_at_utc: None,
            engine_version: None,
        }
    }

    fn check_publication(context: &RunContext) -> StageResult {
        let publication = &context.publication;
        if publication.repository_ref.is_empty() || publication.commit_ref.is_empty() {
            return StageResult::fail(
                STAGE_PUBLICATION,
                CLASS_PUBLICATION,
                "publication refs are incomplete",
            );
        }
        StageResult::pass(STAGE_PUBLICATION)
    }
}

#[async_trait]
impl DecisionKernel for InspectingKernel {
    async fn evaluate(
        &self,
        run_dir: &Path,
        expected_contract_version: &str,
        context: &RunContext,
    ) -> Result<KernelVerdict> {
        let stages: Vec<StageResult> = [
            Self::check_structure(run_dir, expected_contract_version),
            Self::check_independence(context),
            Self::check_integrity(run_dir),
            Self::check_publication(context),
        ]
        .into_iter()
        .map(|s| self.stamp(s))
        .collect();

        Ok(match self.shape {
            VerdictShape::StagesOnly => KernelVerdict::from_stages(stages),
            VerdictShape::WithFlag => {
                let allowed = stages.iter().all(|s| s.passed);
                KernelVerdict::with_flag(stages, allowed)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BoundProposal, Proposal, PROPOSAL_TYPE};
    use crate::run::layout::REPORT_FILE;
    use crate::run::{Identities, ManifestMode, RunMaterializer, CONTRACT_VERSION};

    fn bound() -> BoundProposal {
        BoundProposal::new(Proposal {
            proposal_id: None,
            kind: PROPOSAL_TYPE.to_string(),
            claim_id: "claim-001".to_string(),
            evidence_id: "ev-002-supported".to_string(),
            from: "proposed".into(),
            to: "supported".into(),
            contract_version: CONTRACT_VERSION.to_string(),
            authority_requirements: Vec::new(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_scripted_kernel_replays_queue() {
        let kernel = ScriptedKernel::new();
        kernel.push_outcome(false).push_outcome(true);

        let root = tempfile::tempdir().unwrap();
        let run = RunMaterializer::default()
            .create_run(root.path(), &bound(), &Identities::humans("alice", "bob"))
            .unwrap();

        let first = kernel
            .evaluate(&run.run_dir, CONTRACT_VERSION, &run.context)
            .await
            .unwrap();
        assert_eq!(first.commit_allowed, Some(false));
        let second = kernel
            .evaluate(&run.run_dir, CONTRACT_VERSION, &run.context)
            .await
            .unwrap();
        assert_eq!(second.commit_allowed, Some(true));
        assert!(kernel
            .evaluate(&run.run_dir, CONTRACT_VERSION, &run.context)
            .await
            .is_err());
        assert_eq!(kernel.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_inspecting_kernel_passes_clean_run() {
        let root = tempfile::tempdir().unwrap();
        let run = RunMaterializer::default()
            .with_manifest(ManifestMode::Asserted(vec![REPORT_FILE.to_string()]))
            .create_run(root.path(), &bound(), &Identities::humans("alice", "bob"))
            .unwrap();

        let verdict = InspectingKernel::default()
            .evaluate(&run.run_dir, CONTRACT_VERSION, &run.context)
            .await
            .unwrap();
        assert_eq!(verdict.commit_allowed, Some(true));
        assert_eq!(verdict.stages.len(), 4);
        assert!(verdict.stages.iter().all(|s| s.engine_version.is_some()));
    }

    #[tokio::test]
    async fn test_inspecting_kernel_flags_self_approval() {
        let root = tempfile::tempdir().unwrap();
        let run = RunMaterializer::default()
            .create_run(root.path(), &bound(), &Identities::humans("alice", "alice"))
            .unwrap();

        let verdict = InspectingKernel::new(VerdictShape::StagesOnly)
            .evaluate(&run.run_dir, CONTRACT_VERSION, &run.context)
            .await
            .unwrap();
        assert_eq!(verdict.commit_allowed, None);
        let failed: Vec<_> = verdict.stages.iter().filter(|s| !s.passed).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].stage_id, STAGE_INDEPENDENCE);
        assert_eq!(failed[0].failure_classes, vec![CLASS_AUTHORITY]);
    }

    #[tokio::test]
    async fn test_inspecting_kernel_honours_override() {
        let root = tempfile::tempdir().unwrap();
        let ids = Identities::humans("alice", "alice").with_override(true);
        let run = RunMaterializer::default()
            .create_run(root.path(), &bound(), &ids)
            .unwrap();
        let verdict = InspectingKernel::default()
            .evaluate(&run.run_dir, CONTRACT_VERSION, &run.context)
            .await
            .unwrap();
        assert_eq!(verdict.commit_allowed, Some(true));
    }

    #[tokio::test]
    async fn test_inspecting_kernel_rejects_wrong_contract() {
        let root = tempfile::tempdir().unwrap();
        let run = RunMaterializer::default()
            .create_run(root.path(), &bound(), &Identities::humans("alice", "bob"))
            .unwrap();
        let verdict = InspectingKernel::default()
            .evaluate(&run.run_dir, "0.2.0", &run.context)
            .await
            .unwrap();
        assert_eq!(verdict.commit_allowed, Some(false));
        assert_eq!(verdict.stages[0].failure_classes, vec![CLASS_STRUCTURAL]);
    }
}
