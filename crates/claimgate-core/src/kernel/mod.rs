//! Decision kernel boundary.
//!
//! The kernel is an external, opaque decision function: it inspects a run
//! directory plus its [`RunContext`] and answers with per-stage verdicts.
//! The gateway depends only on the [`DecisionKernel`] trait; the production
//! adapter is [`process::ProcessKernel`] and in-process stand-ins live in
//! [`crate::fakes`].

pub mod process;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Result, StageResult};
use crate::run::RunContext;

pub use process::{KernelConfig, KernelDescription, ProcessKernel, SUPPORTED_PROTOCOLS};

/// Stage ids reported by kernels for run contract 0.1.0.
pub const STAGE_RUN_STRUCTURE: &str = "run-structure";
pub const STAGE_INDEPENDENCE: &str = "independence";
pub const STAGE_INTEGRITY: &str = "integrity";
pub const STAGE_PUBLICATION: &str = "publication-commit";

/// Failure classes attached to failing stages.
pub const CLASS_STRUCTURAL: &str = "structural";
pub const CLASS_AUTHORITY: &str = "authority";
pub const CLASS_INTEGRITY: &str = "integrity";
pub const CLASS_PUBLICATION: &str = "publication";

/// Raw answer of one kernel evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelVerdict {
    /// Ordered per-stage results.
    pub stages: Vec<StageResult>,
    /// Overall flag, when the kernel reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_allowed: Option<bool>,
}

impl KernelVerdict {
    /// Stage results only; the gateway derives the overall outcome.
    pub fn from_stages(stages: Vec<StageResult>) -> Self {
        Self {
            stages,
            commit_allowed: None,
        }
    }

    pub fn with_flag(stages: Vec<StageResult>, commit_allowed: bool) -> Self {
        Self {
            stages,
            commit_allowed: Some(commit_allowed),
        }
    }
}

/// Evaluates a materialized run.
///
/// Implementations must treat the run directory as read-only.
#[async_trait]
pub trait DecisionKernel: Send + Sync {
    async fn evaluate(
        &self,
        run_dir: &Path,
        expected_contract_version: &str,
        context: &RunContext,
    ) -> Result<KernelVerdict>;
}
