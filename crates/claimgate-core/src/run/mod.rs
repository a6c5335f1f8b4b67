//! Audit runs: the self-contained bundle a decision kernel inspects.
//!
//! - `layout`: member names and file schemas of a run directory
//! - `context`: identities and correlation refs passed beside the run
//! - `manifest`: `SHA256SUMS.txt` integrity assertions
//! - `id`: run id format and exclusive directory allocation
//! - `materialize`: writes a complete run for a bound proposal

pub mod context;
pub mod id;
pub mod layout;
pub mod manifest;
pub mod materialize;

pub use context::{Identities, Identity, IntegrityRefs, PublicationRefs, RunContext};
pub use id::{allocate_run_dir, format_run_id, DEFAULT_RUN_PREFIX};
pub use layout::{missing_members, RunMember, CONTRACT_VERSION};
pub use manifest::{IntegrityManifest, ManifestEntry, ManifestMismatch};
pub use materialize::{ManifestMode, MaterializedRun, MaterializerConfig, RunMaterializer};
