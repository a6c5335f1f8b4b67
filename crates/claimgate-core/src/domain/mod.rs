//! Domain models for the claim lifecycle gateway.
//!
//! - `Claim`, `ClaimState`, `RuleTable`: the governed entity and its legal moves
//! - `Evidence`, `ProposalDocument`: loaded justification and proposal inputs
//! - `Proposal`: the canonical, hashed transition attempt
//! - `StageResult`: one enforcement dimension's verdict
//! - `LogEntry`, `RejectionEntry`: audit trail records

pub mod claim;
pub mod digest;
pub mod error;
pub mod evidence;
pub mod log;
pub mod proposal;
pub mod stage;

pub use claim::{Claim, ClaimState, RuleTable, Transition};
pub use error::{GatewayError, Result};
pub use evidence::{Evidence, ProposalDocument, ProposedTransition};
pub use log::{LogEntry, RejectionEntry, RejectionKind};
pub use proposal::{BoundProposal, Proposal, PROPOSAL_TYPE};
pub use stage::StageResult;
