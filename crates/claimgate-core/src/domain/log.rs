//! Audit trail records: committed transitions and recorded rejections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::claim::{ClaimState, Transition};
use super::proposal::BoundProposal;
use super::stage::StageResult;

fn default_true() -> bool {
    true
}

/// An accepted, committed transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub proposal_id: Option<String>,
    #[serde(default)]
    pub proposal_hash: String,
    #[serde(default)]
    pub contract_version: String,
    pub claim_id: String,
    pub evidence_id: String,
    pub from: ClaimState,
    pub to: ClaimState,
    /// Run that was approved for this transition.
    #[serde(alias = "cricore_run_id")]
    pub run_id: String,
    #[serde(default = "default_true")]
    pub kernel_commit_allowed: bool,
}

impl LogEntry {
    pub fn committed(bound: &BoundProposal, run_id: &str) -> Self {
        let p = &bound.proposal;
        Self {
            timestamp: Utc::now(),
            proposal_id: p.proposal_id.clone(),
            proposal_hash: bound.proposal_hash.clone(),
            contract_version: p.contract_version.clone(),
            claim_id: p.claim_id.clone(),
            evidence_id: p.evidence_id.clone(),
            from: p.from.clone(),
            to: p.to.clone(),
            run_id: run_id.to_string(),
            kernel_commit_allowed: true,
        }
    }

    pub fn transition(&self) -> Transition {
        Transition {
            from: self.from.clone(),
            to: self.to.clone(),
        }
    }
}

/// Why an attempt was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// The transition is absent from the rule table; no run was materialized.
    Policy,
    /// The decision kernel denied a materialized run.
    Enforcement,
}

fn default_enforcement() -> RejectionKind {
    RejectionKind::Enforcement
}

/// A denied or policy-rejected attempt, kept for postmortem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_enforcement")]
    pub kind: RejectionKind,
    #[serde(default)]
    pub proposal_id: Option<String>,
    #[serde(default)]
    pub proposal_hash: Option<String>,
    #[serde(default)]
    pub contract_version: Option<String>,
    pub claim_id: String,
    pub evidence_id: String,
    pub from: ClaimState,
    pub to: ClaimState,
    #[serde(default, alias = "cricore_run_id")]
    pub run_id: Option<String>,
    #[serde(default)]
    pub kernel_commit_allowed: bool,
    #[serde(default, alias = "cricore_results")]
    pub stage_results: Vec<StageResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RejectionEntry {
    /// The kernel denied `run_id`.
    pub fn denied(bound: &BoundProposal, run_id: &str, stage_results: Vec<StageResult>) -> Self {
        let p = &bound.proposal;
        Self {
            timestamp: Utc::now(),
            kind: RejectionKind::Enforcement,
            proposal_id: p.proposal_id.clone(),
            proposal_hash: Some(bound.proposal_hash.clone()),
            contract_version: Some(p.contract_version.clone()),
            claim_id: p.claim_id.clone(),
            evidence_id: p.evidence_id.clone(),
            from: p.from.clone(),
            to: p.to.clone(),
            run_id: Some(run_id.to_string()),
            kernel_commit_allowed: false,
            stage_results,
            reason: None,
        }
    }

    /// The rule table does not contain `transition`.
    pub fn policy(
        claim_id: &str,
        evidence_id: &str,
        proposal_id: Option<String>,
        transition: &Transition,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: RejectionKind::Policy,
            proposal_id,
            proposal_hash: None,
            contract_version: None,
            claim_id: claim_id.to_string(),
            evidence_id: evidence_id.to_string(),
            from: transition.from.clone(),
            to: transition.to.clone(),
            run_id: None,
            kernel_commit_allowed: false,
            stage_results: Vec::new(),
            reason: Some(format!("transition {transition} not allowed by rules")),
        }
    }

    /// Stages that did not pass.
    pub fn failing_stages(&self) -> impl Iterator<Item = &StageResult> {
        self.stage_results.iter().filter(|s| !s.passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_transition_entry_loads() {
        let json = r#"{
            "timestamp": "2026-02-13T10:00:00+00:00",
            "claim_id": "claim-001",
            "evidence_id": "ev-002-supported",
            "from": "proposed",
            "to": "supported",
            "cricore_run_id": "DEMO-RUN-20260213T100000Z-000001"
        }"#;
        let entry: LogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.run_id, "DEMO-RUN-20260213T100000Z-000001");
        assert!(entry.kernel_commit_allowed);
        assert_eq!(entry.transition(), Transition::new("proposed", "supported"));
    }

    #[test]
    fn test_legacy_rejection_entry_loads() {
        let json = r#"{
            "timestamp": "2026-02-18T10:00:00+00:00",
            "proposal_id": "proposal-001",
            "proposal_hash": "abc",
            "contract_version": "0.1.0",
            "claim_id": "claim-001",
            "evidence_id": "ev-003-contradicted",
            "from": "supported",
            "to": "contradicted",
            "cricore_run_id": "SHOWCASE-RUN-1",
            "kernel_commit_allowed": false,
            "cricore_results": [
                {"stage_id": "independence", "passed": false, "failure_classes": ["authority"], "messages": ["self approval"], "checked_at_utc": null}
            ]
        }"#;
        let entry: RejectionEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.kind, RejectionKind::Enforcement);
        assert_eq!(entry.run_id.as_deref(), Some("SHOWCASE-RUN-1"));
        assert_eq!(entry.failing_stages().count(), 1);
    }

    #[test]
    fn test_policy_rejection_has_no_run() {
        let entry = RejectionEntry::policy(
            "claim-001",
            "ev-009",
            None,
            &Transition::new("superseded", "proposed"),
        );
        assert_eq!(entry.kind, RejectionKind::Policy);
        assert!(entry.run_id.is_none());
        assert!(entry.stage_results.is_empty());
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "policy");
    }
}
