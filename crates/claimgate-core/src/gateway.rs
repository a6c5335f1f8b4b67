//! Enforcement gateway: asks the decision kernel about a run and derives a
//! single allow/deny outcome. The gateway holds no policy of its own.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{Result, StageResult};
use crate::kernel::{DecisionKernel, KernelVerdict};
use crate::obs;
use crate::run::RunContext;

/// Which part of the verdict decided the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionBasis {
    /// The kernel's own commit flag.
    ExplicitFlag,
    /// Conjunction of every stage pass flag.
    StageConjunction,
}

/// Overall outcome for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    pub basis: DecisionBasis,
    pub stages: Vec<StageResult>,
}

impl Decision {
    /// Derive the outcome from a raw verdict.
    ///
    /// The explicit flag wins when present. Without it every stage must pass,
    /// and an empty stage list is a denial.
    pub fn from_verdict(verdict: KernelVerdict) -> Self {
        match verdict.commit_allowed {
            Some(allowed) => Self {
                allowed,
                basis: DecisionBasis::ExplicitFlag,
                stages: verdict.stages,
            },
            None => Self {
                allowed: !verdict.stages.is_empty() && verdict.stages.iter().all(|s| s.passed),
                basis: DecisionBasis::StageConjunction,
                stages: verdict.stages,
            },
        }
    }

    pub fn failing_stages(&self) -> impl Iterator<Item = &StageResult> {
        self.stages.iter().filter(|s| !s.passed)
    }

    /// Failure classes across all failing stages, in stage order.
    pub fn failure_classes(&self) -> Vec<&str> {
        self.failing_stages()
            .flat_map(|s| s.failure_classes.iter().map(String::as_str))
            .collect()
    }

    /// Human-readable lines for every stage.
    pub fn summary_lines(&self) -> Vec<String> {
        self.stages.iter().flat_map(|s| s.summary_lines()).collect()
    }
}

/// Invokes an injected decision kernel for a fixed contract version.
#[derive(Clone)]
pub struct EnforcementGateway {
    kernel: Arc<dyn DecisionKernel>,
    contract_version: String,
}

impl std::fmt::Debug for EnforcementGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnforcementGateway")
            .field("contract_version", &self.contract_version)
            .finish_non_exhaustive()
    }
}

impl EnforcementGateway {
    pub fn new(kernel: Arc<dyn DecisionKernel>, contract_version: impl Into<String>) -> Self {
        Self {
            kernel,
            contract_version: contract_version.into(),
        }
    }

    pub fn contract_version(&self) -> &str {
        &self.contract_version
    }

    /// Evaluate `run_dir` with `context`. Kernel errors propagate unchanged.
    pub async fn decide(&self, run_dir: &Path, context: &RunContext) -> Result<Decision> {
        let verdict = self
            .kernel
            .evaluate(run_dir, &self.contract_version, context)
            .await?;
        let decision = Decision::from_verdict(verdict);
        obs::emit_decision(
            &run_dir.display().to_string(),
            decision.allowed,
            decision.basis,
            decision.failing_stages().count(),
        );
        Ok(decision)
    }
}
