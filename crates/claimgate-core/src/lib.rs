//! Claimgate Core Library
//!
//! Governed claim lifecycle transitions: evidence binding, audit-run
//! materialization, enforcement through an external decision kernel, and
//! append-only audit logs.

pub mod audit;
pub mod binder;
pub mod config;
pub mod documents;
pub mod domain;
pub mod fakes;
pub mod frontmatter;
pub mod gateway;
pub mod governor;
pub mod kernel;
pub mod lifecycle;
pub mod metrics;
pub mod obs;
pub mod run;
pub mod showcase;
pub mod telemetry;

pub use domain::{
    BoundProposal, Claim, ClaimState, Evidence, GatewayError, LogEntry, Proposal,
    ProposalDocument, ProposedTransition, RejectionEntry, RejectionKind, Result, RuleTable,
    StageResult, Transition, PROPOSAL_TYPE,
};

pub use audit::{AuditLog, LogFile};
pub use binder::{bind, bind_detached, BindOutcome, BindRequest};
pub use config::GatewayConfig;
pub use documents::{
    load_claim, load_evidence, load_proposal, load_proposals_dir, load_rules, ProjectLayout,
};
pub use frontmatter::FrontMatter;
pub use gateway::{Decision, DecisionBasis, EnforcementGateway};
pub use governor::{AttemptPlan, BatchReport, Governor, Outcome};
pub use kernel::{DecisionKernel, KernelConfig, KernelVerdict, ProcessKernel};
pub use run::{
    Identities, Identity, IntegrityManifest, ManifestMode, MaterializedRun, MaterializerConfig,
    RunContext, RunMaterializer, CONTRACT_VERSION,
};
pub use showcase::{standard_scenarios, HarnessError, Perturbation, Scenario, Showcase};

pub use metrics::METRICS;
pub use obs::{
    emit_decision, emit_kernel_resolved, emit_policy_rejection, emit_proposal_skipped,
    emit_run_materialized, emit_transition_committed, emit_transition_denied, RunSpan,
};
pub use telemetry::init_tracing;

/// Claimgate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
