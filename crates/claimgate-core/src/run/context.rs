//! The ephemeral context handed to the decision kernel next to a run.

use serde::{Deserialize, Serialize};

use crate::domain::Proposal;

/// An actor taking part in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Identity {
    pub fn human(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: "human".to_string(),
        }
    }
}

/// Who orchestrated the attempt and who reviewed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identities {
    pub orchestrator: Identity,
    pub reviewer: Identity,
    pub self_approval_override: bool,
}

impl Identities {
    pub fn humans(orchestrator: &str, reviewer: &str) -> Self {
        Self {
            orchestrator: Identity::human(orchestrator),
            reviewer: Identity::human(reviewer),
            self_approval_override: false,
        }
    }

    pub fn with_override(mut self, self_approval_override: bool) -> Self {
        self.self_approval_override = self_approval_override;
        self
    }

    /// Reviewer and orchestrator are the same actor.
    pub fn is_self_approval(&self) -> bool {
        self.orchestrator.id == self.reviewer.id
    }
}

/// Opaque correlation strings for the kernel's integrity stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityRefs {
    pub workflow_execution_ref: String,
    pub run_payload_ref: String,
    pub attestation_ref: String,
}

impl IntegrityRefs {
    pub fn for_run(scheme: &str, run_id: &str) -> Self {
        Self {
            workflow_execution_ref: format!("{scheme}://{run_id}"),
            run_payload_ref: format!("{scheme}://{run_id}/payload"),
            attestation_ref: format!("{scheme}://{run_id}/attestation"),
        }
    }
}

/// Repository/commit correlation for the publication stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRefs {
    pub repository_ref: String,
    pub commit_ref: String,
}

/// Context passed verbatim to the kernel alongside the run directory.
/// Never written into the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    pub identities: Identities,
    pub integrity: IntegrityRefs,
    pub publication: PublicationRefs,
    pub proposal: Proposal,
}
