//! Claims, lifecycle states and the transition rule table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque lifecycle state label (e.g. `proposed`, `supported`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimState(pub String);

impl ClaimState {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClaimState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClaimState {
    fn from(label: &str) -> Self {
        Self(label.to_string())
    }
}

/// The governed entity whose lifecycle state is tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub claim_id: String,
    pub current_state: ClaimState,
}

impl Claim {
    pub fn new(claim_id: impl Into<String>, current_state: impl Into<ClaimState>) -> Self {
        Self {
            claim_id: claim_id.into(),
            current_state: current_state.into(),
        }
    }
}

/// An ordered `(from, to)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transition {
    pub from: ClaimState,
    pub to: ClaimState,
}

impl Transition {
    pub fn new(from: impl Into<ClaimState>, to: impl Into<ClaimState>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// The fixed table of legal transitions. Order is preserved from the source
/// document but carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTable {
    pub allowed_transitions: Vec<Transition>,
}

impl RuleTable {
    pub fn new(allowed_transitions: Vec<Transition>) -> Self {
        Self {
            allowed_transitions,
        }
    }

    /// Outgoing edges declared for `state`.
    pub fn successors<'a>(&'a self, state: &'a ClaimState) -> impl Iterator<Item = &'a ClaimState> {
        self.allowed_transitions
            .iter()
            .filter(move |t| &t.from == state)
            .map(|t| &t.to)
    }
}
