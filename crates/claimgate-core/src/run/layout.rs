//! On-disk layout of an audit run.
//!
//! Member names are the compatibility surface with the decision kernel for
//! contract version [`CONTRACT_VERSION`]; do not rename them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::context::Identity;

/// Run contract version understood by the decision kernel (not the crate
/// version).
pub const CONTRACT_VERSION: &str = "0.1.0";

pub const CONTRACT_FILE: &str = "contract.json";
pub const REPORT_FILE: &str = "report.md";
pub const RANDOMNESS_FILE: &str = "randomness.json";
pub const APPROVAL_FILE: &str = "approval.json";
pub const MANIFEST_FILE: &str = "SHA256SUMS.txt";
pub const VALIDATION_DIR: &str = "validation";
pub const INVARIANT_RESULTS_FILE: &str = "validation/invariant_results.json";

/// A required member of a run directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMember {
    Contract,
    Report,
    Randomness,
    Approval,
    Manifest,
    InvariantResults,
}

impl RunMember {
    /// Every member a complete run must contain.
    pub const REQUIRED: [RunMember; 6] = [
        RunMember::Contract,
        RunMember::Report,
        RunMember::Randomness,
        RunMember::Approval,
        RunMember::Manifest,
        RunMember::InvariantResults,
    ];

    /// Path relative to the run directory.
    pub fn relative_path(&self) -> &'static str {
        match self {
            RunMember::Contract => CONTRACT_FILE,
            RunMember::Report => REPORT_FILE,
            RunMember::Randomness => RANDOMNESS_FILE,
            RunMember::Approval => APPROVAL_FILE,
            RunMember::Manifest => MANIFEST_FILE,
            RunMember::InvariantResults => INVARIANT_RESULTS_FILE,
        }
    }

    pub fn path_in(&self, run_dir: &Path) -> PathBuf {
        run_dir.join(self.relative_path())
    }
}

/// Required members absent from `run_dir`, in [`RunMember::REQUIRED`] order.
pub fn missing_members(run_dir: &Path) -> Vec<RunMember> {
    RunMember::REQUIRED
        .into_iter()
        .filter(|m| !m.path_in(run_dir).is_file())
        .collect()
}

/// `contract.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDescriptor {
    pub contract_version: String,
    pub run_id: String,
    pub created_utc: String,
}

/// `randomness.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomnessDeclaration {
    pub run_id: String,
    pub deterministic: bool,
    pub seed: Option<u64>,
}

/// `approval.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub run_id: String,
    pub approver: Identity,
    pub approved_at_utc: String,
    pub context_ref: String,
}

/// `validation/invariant_results.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantResults {
    pub run_id: String,
    pub generated_at_utc: String,
    pub notes: String,
}
