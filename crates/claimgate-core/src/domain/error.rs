//! Error taxonomy for the claim lifecycle gateway.

use std::path::PathBuf;

/// Errors produced while binding, materializing, deciding and logging
/// claim transitions.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(
        "binding mismatch for evidence {evidence_id}: proposal declares {proposed} but evidence declares {declared}"
    )]
    BindingMismatch {
        evidence_id: String,
        proposed: String,
        declared: String,
    },

    #[error("evidence {evidence_id} belongs to claim {owner}, not {claim_id}")]
    ClaimMismatch {
        evidence_id: String,
        claim_id: String,
        owner: String,
    },

    #[error("transition {from} -> {to} is not permitted by the rule table")]
    PolicyRejection { from: String, to: String },

    #[error("failed to materialize run {run_id}: {source}")]
    Materialization {
        run_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("decision kernel '{program}' not found (searched: {searched})")]
    KernelUnavailable { program: String, searched: String },

    #[error("decision kernel is incompatible: {0}")]
    KernelIncompatible(String),

    #[error("decision kernel failed: {0}")]
    KernelFailure(String),

    #[error("decision kernel returned malformed output: {0}")]
    KernelProtocol(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid document {path}: {reason}")]
    Document { path: PathBuf, reason: String },

    #[error("transition log diverges at entry {index}: {reason}")]
    ReplayDiverged { index: usize, reason: String },

    #[error("value cannot be canonicalized: {0}")]
    NonCanonical(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Whether this failure must stop the whole batch rather than just the
    /// current proposal entry.
    pub fn aborts_batch(&self) -> bool {
        matches!(
            self,
            GatewayError::KernelUnavailable { .. }
                | GatewayError::KernelIncompatible(_)
                | GatewayError::KernelFailure(_)
                | GatewayError::KernelProtocol(_)
                | GatewayError::Config(_)
        )
    }

    pub(crate) fn document(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        GatewayError::Document {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
