//! The canonical, hashable description of an attempted transition.

use serde::{Deserialize, Serialize};

use super::claim::{ClaimState, Transition};
use super::digest::{canonical_digest, canonical_json};
use super::error::Result;

/// Value of the `type` field of every proposal.
pub const PROPOSAL_TYPE: &str = "claim_transition";

/// A proposed transition bound to its evidence.
///
/// Contains only semantic fields: no timestamps, run ids or identities, so
/// repeated attempts of the same proposal hash identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub claim_id: String,
    pub evidence_id: String,
    pub from: ClaimState,
    pub to: ClaimState,
    pub contract_version: String,
    #[serde(default)]
    pub authority_requirements: Vec<serde_json::Value>,
}

impl Proposal {
    pub fn transition(&self) -> Transition {
        Transition {
            from: self.from.clone(),
            to: self.to.clone(),
        }
    }

    /// Canonical compact JSON (sorted keys, fixed separators).
    pub fn canonical_json(&self) -> Result<String> {
        canonical_json(&serde_json::to_value(self)?)
    }

    /// SHA-256 of [`Proposal::canonical_json`].
    pub fn content_hash(&self) -> Result<String> {
        canonical_digest(self)
    }
}

/// A proposal together with its content hash.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundProposal {
    pub proposal: Proposal,
    pub proposal_hash: String,
}

impl BoundProposal {
    pub fn new(proposal: Proposal) -> Result<Self> {
        let proposal_hash = proposal.content_hash()?;
        Ok(Self {
            proposal,
            proposal_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn proposal() -> Proposal {
        Proposal {
            proposal_id: Some("proposal-001".to_string()),
            kind: PROPOSAL_TYPE.to_string(),
            claim_id: "claim-001".to_string(),
            evidence_id: "ev-003-contradicted".to_string(),
            from: "supported".into(),
            to: "contradicted".into(),
            contract_version: "0.1.0".to_string(),
            authority_requirements: vec![json!({ "role": "reviewer" })],
        }
    }

    #[test]
    fn test_hash_matches_hand_built_object() {
        // Same semantic content assembled in a different key order.
        let by_hand = json!({
            "to": "contradicted",
            "authority_requirements": [{ "role": "reviewer" }],
            "contract_version": "0.1.0",
            "from": "supported",
            "evidence_id": "ev-003-contradicted",
            "claim_id": "claim-001",
            "type": "claim_transition",
            "proposal_id": "proposal-001",
        });
        assert_eq!(
            proposal().content_hash().unwrap(),
            canonical_digest(&by_hand).unwrap()
        );
    }

    #[test]
    fn test_canonical_json_is_compact_and_sorted() {
        let json = proposal().canonical_json().unwrap();
        assert!(json.starts_with(r#"{"authority_requirements":[{"role":"reviewer"}],"claim_id":"claim-001""#));
        assert!(!json.contains(": "));
    }

    #[test]
    fn test_hash_changes_with_target_state() {
        let mut other = proposal();
        other.to = "superseded".into();
        assert_ne!(
            proposal().content_hash().unwrap(),
            other.content_hash().unwrap()
        );
    }

    #[test]
    fn test_missing_proposal_id_is_omitted() {
        let mut p = proposal();
        p.proposal_id = None;
        assert!(!p.canonical_json().unwrap().contains("proposal_id"));
    }
}
