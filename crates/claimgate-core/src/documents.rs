//! Read-only project documents: claim, rule table, proposals, evidence.
//!
//! Every document is a front-matter file with a YAML body. Layout under a
//! project root:
//!
//! ```text
//! claims/claim-001.yaml
//! rules/transition-rules.yaml
//! proposals/*.yaml
//! evidence/<evidence_id>.yaml
//! transitions/transition-log.json
//! transitions/rejections-log.json
//! runs/<run_id>/
//! ```

use std::path::{Component, Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::domain::{Claim, Evidence, GatewayError, ProposalDocument, Result, RuleTable};
use crate::frontmatter::FrontMatter;

pub const CLAIM_FILE: &str = "claims/claim-001.yaml";
pub const RULES_FILE: &str = "rules/transition-rules.yaml";
pub const PROPOSALS_DIR: &str = "proposals";
pub const EVIDENCE_DIR: &str = "evidence";
pub const TRANSITION_LOG_FILE: &str = "transitions/transition-log.json";
pub const REJECTION_LOG_FILE: &str = "transitions/rejections-log.json";
pub const RUNS_DIR: &str = "runs";

/// Resolved paths of a project tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub claim: PathBuf,
    pub rules: PathBuf,
    pub proposals: PathBuf,
    pub evidence: PathBuf,
    pub transition_log: PathBuf,
    pub rejection_log: PathBuf,
    pub runs: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            claim: root.join(CLAIM_FILE),
            rules: root.join(RULES_FILE),
            proposals: root.join(PROPOSALS_DIR),
            evidence: root.join(EVIDENCE_DIR),
            transition_log: root.join(TRANSITION_LOG_FILE),
            rejection_log: root.join(REJECTION_LOG_FILE),
            runs: root.join(RUNS_DIR),
            root,
        }
    }

    /// Put runs somewhere else; relative paths are taken from the root.
    pub fn with_runs_dir(mut self, runs: impl AsRef<Path>) -> Self {
        self.runs = self.root.join(runs);
        self
    }

    pub fn evidence_path(&self, evidence_id: &str) -> PathBuf {
        let yaml = self.evidence.join(format!("{evidence_id}.yaml"));
        if yaml.is_file() {
            return yaml;
        }
        let yml = self.evidence.join(format!("{evidence_id}.yml"));
        if yml.is_file() {
            yml
        } else {
            yaml
        }
    }
}

/// Parse the YAML body of the front-matter document at `path`.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| GatewayError::document(path, e.to_string()))?;
    let doc = FrontMatter::parse(&text).map_err(|reason| GatewayError::document(path, reason))?;
    serde_yaml::from_str(&doc.body).map_err(|e| GatewayError::document(path, e.to_string()))
}

pub fn load_claim(path: &Path) -> Result<Claim> {
    let claim: Claim = load_document(path)?;
    if claim.claim_id.trim().is_empty() {
        return Err(GatewayError::document(path, "claim_id is empty"));
    }
    Ok(claim)
}

pub fn load_rules(path: &Path) -> Result<RuleTable> {
    load_document(path)
}

pub fn load_proposal(path: &Path) -> Result<ProposalDocument> {
    load_document(path)
}

/// An evidence id names one file directly inside the evidence directory.
fn check_evidence_id(layout: &ProjectLayout, evidence_id: &str) -> Result<()> {
    let mut components = Path::new(evidence_id).components();
    let plain = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !plain || evidence_id.contains(['/', '\\']) || evidence_id.contains("..") {
        return Err(GatewayError::document(
            &layout.evidence,
            format!("evidence id '{evidence_id}' is not a plain file name"),
        ));
    }
    Ok(())
}

/// Load `evidence_id` from `layout` and check the document is the one asked for.
pub fn load_evidence(layout: &ProjectLayout, evidence_id: &str) -> Result<Evidence> {
    check_evidence_id(layout, evidence_id)?;
    let path = layout.evidence_path(evidence_id);
    let evidence: Evidence = load_document(&path)?;
    if evidence.evidence_id != evidence_id {
        return Err(GatewayError::document(
            &path,
            format!(
                "declares evidence_id '{}', expected '{evidence_id}'",
                evidence.evidence_id
            ),
        ));
    }
    Ok(evidence)
}

/// Every `*.yaml` / `*.yml` proposal in `dir`, ordered by file name. A
/// missing directory holds no proposals.
pub fn load_proposals_dir(dir: &Path) -> Result<Vec<(PathBuf, ProposalDocument)>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
        })
        .collect();
    paths.sort();

    paths
        .into_iter()
        .map(|path| load_proposal(&path).map(|doc| (path, doc)))
        .collect()
}
