//! Evidence documents and the proposal documents that cite them.

use serde::{Deserialize, Serialize};

use super::claim::{ClaimState, Transition};

/// A justification artifact for one claim-state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub evidence_id: String,
    pub claim_id: String,
    pub intended_transition: Transition,
}

/// One `(from, to)` entry in a proposal document, citing its evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedTransition {
    pub evidence_id: String,
    pub from: ClaimState,
    pub to: ClaimState,
}

impl ProposedTransition {
    pub fn transition(&self) -> Transition {
        Transition {
            from: self.from.clone(),
            to: self.to.clone(),
        }
    }
}

/// A proposal document: shared metadata plus the transitions it proposes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalDocument {
    #[serde(default)]
    pub proposal_id: Option<String>,
    #[serde(default)]
    pub contract_version: Option<String>,
    #[serde(default)]
    pub authority_requirements: Vec<serde_json::Value>,
    #[serde(default)]
    pub transitions: Vec<ProposedTransition>,
}

impl ProposalDocument {
    /// The entry citing `evidence_id`, if any.
    pub fn entry_for(&self, evidence_id: &str) -> Option<&ProposedTransition> {
        self.transitions.iter().find(|t| t.evidence_id == evidence_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evidence_from_yaml() {
        let yaml = "evidence_id: ev-002-supported\nclaim_id: claim-001\nintended_transition:\n  from: proposed\n  to: supported\n";
        let ev: Evidence = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(ev.evidence_id, "ev-002-supported");
        assert_eq!(ev.intended_transition, Transition::new("proposed", "supported"));
    }

    #[test]
    fn test_proposal_document_defaults() {
        let yaml = "transitions:\n  - evidence_id: ev-003\n    from: supported\n    to: contradicted\n";
        let doc: ProposalDocument = serde_yaml::from_str(yaml).unwrap();
        assert!(doc.proposal_id.is_none());
        assert!(doc.authority_requirements.is_empty());
        assert_eq!(
            doc.entry_for("ev-003").map(ProposedTransition::transition),
            Some(Transition::new("supported", "contradicted"))
        );
        assert!(doc.entry_for("ev-999").is_none());
    }

    #[test]
    fn test_authority_requirements_keep_structure() {
        let yaml = "proposal_id: proposal-001\nauthority_requirements:\n  - role: reviewer\n    independent: true\ntransitions: []\n";
        let doc: ProposalDocument = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            doc.authority_requirements[0]["independent"],
            serde_json::Value::Bool(true)
        );
    }
}
