//! Run materialization.
//!
//! Writes every required member of a run directory and returns the
//! [`RunContext`] to hand to the decision kernel. The integrity manifest is
//! written last, so asserted digests cover the final content of every other
//! member; any later change to an asserted file shows up as a mismatch.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use super::context::{Identities, IntegrityRefs, PublicationRefs, RunContext};
use super::id::{allocate_run_dir, DEFAULT_RUN_PREFIX};
use super::layout::{
    ApprovalRecord, ContractDescriptor, InvariantResults, RandomnessDeclaration, APPROVAL_FILE,
    CONTRACT_FILE, CONTRACT_VERSION, INVARIANT_RESULTS_FILE, RANDOMNESS_FILE, REPORT_FILE,
    VALIDATION_DIR,
};
use super::manifest::IntegrityManifest;
use crate::domain::{BoundProposal, GatewayError, Result};
use crate::metrics::METRICS;
use crate::obs;

/// What the integrity manifest asserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestMode {
    /// Comment-only manifest; the integrity dimension is not exercised.
    Placeholder,
    /// Digest of each listed run-relative path at manifest-write time.
    Asserted(Vec<String>),
}

/// Settings shared by every run a materializer creates.
#[derive(Debug, Clone)]
pub struct MaterializerConfig {
    pub contract_version: String,
    pub run_id_prefix: String,
    /// Scheme of the integrity correlation refs (`<scheme>://<run_id>`).
    pub ref_scheme: String,
    /// `context_ref` recorded in `approval.json`.
    pub context_ref: String,
    pub repository_ref: String,
    pub commit_ref: String,
    pub report_title: String,
    pub manifest: ManifestMode,
}

impl Default for MaterializerConfig {
    fn default() -> Self {
        Self {
            contract_version: CONTRACT_VERSION.to_string(),
            run_id_prefix: DEFAULT_RUN_PREFIX.to_string(),
            ref_scheme: "claimgate".to_string(),
            context_ref: "claimgate-governor".to_string(),
            repository_ref: "claimgate://claim-lifecycle".to_string(),
            commit_ref: "uncommitted-local-run".to_string(),
            report_title: "Claim Transition Run Report".to_string(),
            manifest: ManifestMode::Placeholder,
        }
    }
}

/// A run directory ready for the decision kernel.
#[derive(Debug, Clone)]
pub struct MaterializedRun {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub context: RunContext,
}

/// Builds audit-run directories.
#[derive(Debug, Clone, Default)]
pub struct RunMaterializer {
    config: MaterializerConfig,
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    std::fs::write(path, json)
}

fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

impl RunMaterializer {
    pub fn new(config: MaterializerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MaterializerConfig {
        &self.config
    }

    /// Same settings with a different manifest mode.
    pub fn with_manifest(&self, manifest: ManifestMode) -> Self {
        let mut config = self.config.clone();
        config.manifest = manifest;
        Self { config }
    }

    /// Allocate a fresh run under `runs_root` and materialize it.
    pub fn create_run(
        &self,
        runs_root: &Path,
        bound: &BoundProposal,
        identities: &Identities,
    ) -> Result<MaterializedRun> {
        let (run_id, run_dir) = allocate_run_dir(runs_root, &self.config.run_id_prefix)
            .map_err(|source| GatewayError::Materialization {
                run_id: self.config.run_id_prefix.clone(),
                source,
            })?;
        let context = self.materialize(&run_dir, &run_id, bound, identities)?;
        Ok(MaterializedRun {
            run_id,
            run_dir,
            context,
        })
    }

    /// Write every required member into `run_dir` and build the context.
    ///
    /// `run_dir` must be absent or empty. On failure the partially written
    /// directory is removed so it can never be mistaken for a complete run.
    pub fn materialize(
        &self,
        run_dir: &Path,
        run_id: &str,
        bound: &BoundProposal,
        identities: &Identities,
    ) -> Result<RunContext> {
        let materialization = |source| GatewayError::Materialization {
            run_id: run_id.to_string(),
            source,
        };

        if run_dir.exists() && std::fs::read_dir(run_dir).map_err(materialization)?.next().is_some() {
            return Err(materialization(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("run directory {} is not empty", run_dir.display()),
            )));
        }

        if let Err(source) = self.write_members(run_dir, run_id, bound, identities) {
            if let Err(cleanup) = std::fs::remove_dir_all(run_dir) {
                warn!(run_id = %run_id, error = %cleanup, "failed to remove partial run");
            }
            return Err(materialization(source));
        }

        METRICS.inc_runs_materialized();
        obs::emit_run_materialized(run_id, &bound.proposal_hash, run_dir);

        Ok(RunContext {
            identities: identities.clone(),
            integrity: IntegrityRefs::for_run(&self.config.ref_scheme, run_id),
            publication: PublicationRefs {
                repository_ref: self.config.repository_ref.clone(),
                commit_ref: self.config.commit_ref.clone(),
            },
            proposal: bound.proposal.clone(),
        })
    }

    fn write_members(
        &self,
        run_dir: &Path,
        run_id: &str,
        bound: &BoundProposal,
        identities: &Identities,
    ) -> std::io::Result<()> {
        std::fs::create_dir_all(run_dir.join(VALIDATION_DIR))?;

        let created_utc = now_iso();
        write_json(
            &run_dir.join(CONTRACT_FILE),
            &ContractDescriptor {
                contract_version: self.config.contract_version.clone(),
                run_id: run_id.to_string(),
                created_utc: created_utc.clone(),
            },
        )?;

        std::fs::write(
            run_dir.join(REPORT_FILE),
            self.render_report(run_id, &created_utc, bound)?,
        )?;

        write_json(
            &run_dir.join(RANDOMNESS_FILE),
            &RandomnessDeclaration {
                run_id: run_id.to_string(),
                deterministic: true,
                seed: None,
            },
        )?;

        write_json(
            &run_dir.join(APPROVAL_FILE),
            &ApprovalRecord {
                run_id: run_id.to_string(),
                approver: identities.reviewer.clone(),
                approved_at_utc: now_iso(),
                context_ref: self.config.context_ref.clone(),
            },
        )?;

        write_json(
            &run_dir.join(INVARIANT_RESULTS_FILE),
            &InvariantResults {
                run_id: run_id.to_string(),
                generated_at_utc: now_iso(),
                notes: "invariant outputs are presence-only for claim transition runs".to_string(),
            },
        )?;

        let manifest = match &self.config.manifest {
            ManifestMode::Placeholder => IntegrityManifest::default(),
            ManifestMode::Asserted(paths) => IntegrityManifest::compute(run_dir, paths)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?,
        };
        manifest
            .write(run_dir)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    }

    fn render_report(
        &self,
        run_id: &str,
        created_utc: &str,
        bound: &BoundProposal,
    ) -> std::io::Result<String> {
        let proposal_json =
            serde_json::to_string_pretty(&bound.proposal).map_err(std::io::Error::from)?;
        let lines = [
            format!("# {}", self.config.report_title),
            String::new(),
            format!("- run_id: `{run_id}`"),
            format!("- created_utc: `{created_utc}`"),
            format!("- contract_version: `{}`", self.config.contract_version),
            format!("- proposal_hash: `{}`", bound.proposal_hash),
            String::new(),
            "## Proposal".to_string(),
            "```json".to_string(),
            proposal_json,
            "```".to_string(),
            String::new(),
        ];
        Ok(lines.join("\n"))
    }
}
