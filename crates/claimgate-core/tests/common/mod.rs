//! Shared project fixture: one claim, the standard rule table, a proposal
//! with three entries and their evidence.

#![allow(dead_code)]

use std::path::Path;

use claimgate_core::ProjectLayout;

pub const LOG_HEADER: &str = "title: \"Transition log\"\nfiletype: \"log\"\n# maintained by hand before automation\nanchors:\n  - \"CLAIM-LOG-v0.2.0\"\n";

fn write(path: &Path, text: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

fn evidence(layout: &ProjectLayout, id: &str, from: &str, to: &str) {
    write(
        &layout.evidence_path(id),
        &format!(
            "---\ntitle: \"{id}\"\ntype: \"evidence\"\n---\nevidence_id: {id}\nclaim_id: claim-001\nintended_transition:\n  from: {from}\n  to: {to}\n"
        ),
    );
}

/// Write a complete project under `root` with the claim in `state`.
pub fn project(root: &Path, state: &str) -> ProjectLayout {
    let layout = ProjectLayout::new(root);
    write(
        &layout.claim,
        &format!("---\ntitle: \"Claim 001\"\n---\nclaim_id: claim-001\ncurrent_state: {state}\n"),
    );
    write(
        &layout.rules,
        "---\ntitle: \"Transition rules\"\n---\nallowed_transitions:\n  - from: proposed\n    to: supported\n  - from: supported\n    to: contradicted\n  - from: contradicted\n    to: superseded\n",
    );
    write(
        &layout.proposals.join("proposal-001.yaml"),
        "---\ntitle: \"Proposal 001\"\n---\nproposal_id: proposal-001\ncontract_version: \"0.1.0\"\nauthority_requirements:\n  - role: reviewer\n    independent_of: orchestrator\ntransitions:\n  - evidence_id: ev-002-supported\n    from: proposed\n    to: supported\n  - evidence_id: ev-003-contradicted\n    from: supported\n    to: contradicted\n  - evidence_id: ev-005-withdrawn\n    from: contradicted\n    to: proposed\n",
    );
    evidence(&layout, "ev-002-supported", "proposed", "supported");
    evidence(&layout, "ev-003-contradicted", "supported", "contradicted");
    evidence(&layout, "ev-005-withdrawn", "contradicted", "proposed");
    write(&layout.transition_log, &format!("---\n{LOG_HEADER}---\n[]"));
    layout
}
