//! Lifecycle state machine.
//!
//! Legality is an exact lookup in the [`RuleTable`]: no wildcards, no
//! implicit self-loops, no transitive inference. A state with no outgoing
//! rules is effectively terminal.

use crate::domain::{Claim, ClaimState, GatewayError, LogEntry, Result, RuleTable};

/// Whether the rule table declares exactly `(from, to)`.
pub fn is_allowed(rules: &RuleTable, from: &ClaimState, to: &ClaimState) -> bool {
    rules
        .allowed_transitions
        .iter()
        .any(|rule| &rule.from == from && &rule.to == to)
}

/// Produce the claim advanced to `to`.
///
/// The caller must already hold a rule-table match and an enforcement
/// approval for this move.
pub fn apply(claim: &Claim, to: &ClaimState) -> Claim {
    Claim {
        claim_id: claim.claim_id.clone(),
        current_state: to.clone(),
    }
}

/// Fold a transition log over the claim's initial state.
///
/// Fails when an entry names another claim, starts from a state other than
/// the one left by the previous entry, or is absent from the rule table.
pub fn replay(initial: &Claim, rules: &RuleTable, entries: &[LogEntry]) -> Result<Claim> {
    let mut claim = initial.clone();
    for (index, entry) in entries.iter().enumerate() {
        if entry.claim_id != claim.claim_id {
            return Err(GatewayError::ReplayDiverged {
                index,
                reason: format!("entry is for claim {}", entry.claim_id),
            });
        }
        if entry.from != claim.current_state {
            return Err(GatewayError::ReplayDiverged {
                index,
                reason: format!(
                    "entry starts from {} but claim is in {}",
                    entry.from, claim.current_state
                ),
            });
        }
        if !is_allowed(rules, &entry.from, &entry.to) {
            return Err(GatewayError::ReplayDiverged {
                index,
                reason: format!("{} is not in the rule table", entry.transition()),
            });
        }
        claim = apply(&claim, &entry.to);
    }
    Ok(claim)
}
