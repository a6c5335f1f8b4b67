//! Evidence/proposal binding.
//!
//! Checks, in order:
//! 1. the proposal entry and its evidence declare the same `(from, to)` and
//!    the evidence belongs to the claim (else [`GatewayError::BindingMismatch`]
//!    / [`GatewayError::ClaimMismatch`]);
//! 2. `from` is the claim's current state (else [`BindOutcome::Stale`]);
//! 3. the rule table declares the pair (else [`GatewayError::PolicyRejection`]).
//!
//! On success the canonical [`Proposal`] and its hash are produced.

use crate::domain::{
    BoundProposal, Claim, Evidence, GatewayError, Proposal, ProposalDocument, ProposedTransition,
    Result, RuleTable, Transition, PROPOSAL_TYPE,
};
use crate::lifecycle;

/// Result of binding one proposal entry.
#[derive(Debug, Clone, PartialEq)]
pub enum BindOutcome {
    /// The proposal applies to the current state and is legal.
    Bound(BoundProposal),
    /// `from` no longer matches the current state. Not an error.
    Stale,
}

/// Everything the binder needs for one proposal entry.
#[derive(Debug, Clone, Copy)]
pub struct BindRequest<'a> {
    pub claim: &'a Claim,
    pub rules: &'a RuleTable,
    pub document: &'a ProposalDocument,
    pub entry: &'a ProposedTransition,
    pub evidence: &'a Evidence,
    /// Used when the proposal document does not pin a contract version.
    pub default_contract_version: &'a str,
}

/// Bind a proposal entry to its evidence.
pub fn bind(req: BindRequest<'_>) -> Result<BindOutcome> {
    let proposed = check_evidence(req.entry, req.evidence)?;
    if req.evidence.claim_id != req.claim.claim_id {
        return Err(GatewayError::ClaimMismatch {
            evidence_id: req.evidence.evidence_id.clone(),
            claim_id: req.claim.claim_id.clone(),
            owner: req.evidence.claim_id.clone(),
        });
    }

    if proposed.from != req.claim.current_state {
        return Ok(BindOutcome::Stale);
    }

    build(
        req.rules,
        req.document,
        req.evidence,
        proposed,
        req.default_contract_version,
    )
    .map(BindOutcome::Bound)
}

/// Bind without consulting a claim's current state.
///
/// Evidence agreement and the rule table are still enforced. Used by the
/// scenario harness, which never advances the claim.
pub fn bind_detached(
    rules: &RuleTable,
    document: &ProposalDocument,
    entry: &ProposedTransition,
    evidence: &Evidence,
    default_contract_version: &str,
) -> Result<BoundProposal> {
    let proposed = check_evidence(entry, evidence)?;
    build(rules, document, evidence, proposed, default_contract_version)
}

fn check_evidence(entry: &ProposedTransition, evidence: &Evidence) -> Result<Transition> {
    let proposed = entry.transition();
    let declared = &evidence.intended_transition;
    if &proposed != declared {
        return Err(GatewayError::BindingMismatch {
            evidence_id: evidence.evidence_id.clone(),
            proposed: proposed.to_string(),
            declared: declared.to_string(),
        });
    }
    Ok(proposed)
}

fn build(
    rules: &RuleTable,
    document: &ProposalDocument,
    evidence: &Evidence,
    proposed: Transition,
    default_contract_version: &str,
) -> Result<BoundProposal> {
    if !lifecycle::is_allowed(rules, &proposed.from, &proposed.to) {
        return Err(GatewayError::PolicyRejection {
            from: proposed.from.to_string(),
            to: proposed.to.to_string(),
        });
    }

    let proposal = Proposal {
        proposal_id: document.proposal_id.clone(),
        kind: PROPOSAL_TYPE.to_string(),
        claim_id: evidence.claim_id.clone(),
        evidence_id: evidence.evidence_id.clone(),
        from: proposed.from,
        to: proposed.to,
        contract_version: document
            .contract_version
            .clone()
            .unwrap_or_else(|| default_contract_version.to_string()),
        authority_requirements: document.authority_requirements.clone(),
    };

    BoundProposal::new(proposal)
}
