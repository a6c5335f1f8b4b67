//! Claimgate - Claim Lifecycle Gateway CLI
//!
//! The `claimgate` command drives evidence-bound claim transitions through an
//! external decision kernel and keeps the audit logs.
//!
//! ## Commands
//!
//! - `run`: Process every proposal entry against the current claim state
//! - `showcase`: Run the fail→fix enforcement scenarios for one proposal
//! - `status`: Show claim state, log sizes and whether the log replays
//! - `verify-run`: Check a run directory's members and digest assertions
//! - `hash-proposal`: Print a proposal's canonical JSON and hash

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

use claimgate_core::run::missing_members;
use claimgate_core::{
    bind_detached, lifecycle, load_claim, load_evidence, load_proposals_dir, load_rules,
    standard_scenarios, AttemptPlan, AuditLog, BoundProposal, EnforcementGateway,
    GatewayConfig, Governor, Identities, IntegrityManifest, ProcessKernel, ProjectLayout,
    RunMaterializer, Showcase, METRICS,
};

#[derive(Parser)]
#[command(name = "claimgate")]
#[command(author = "Claimgate Maintainers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Claim lifecycle gateway", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that talks to the kernel.
#[derive(Args, Debug)]
struct GatewayArgs {
    /// Project root (claims/, rules/, proposals/, evidence/, transitions/)
    #[arg(long, env = "CLAIMGATE_ROOT", default_value = ".")]
    root: PathBuf,

    /// Kernel program name or path
    #[arg(long)]
    kernel: Option<String>,

    /// Directories searched for the kernel, `:`-separated
    #[arg(long)]
    kernel_path: Option<OsString>,

    /// Where runs are created (default: <root>/runs)
    #[arg(long)]
    runs_dir: Option<PathBuf>,

    /// Run contract version expected from the kernel
    #[arg(long)]
    contract_version: Option<String>,
}

impl GatewayArgs {
    /// Environment defaults, then flags.
    fn config(&self) -> Result<GatewayConfig> {
        let mut config = GatewayConfig::from_env(&self.root)
            .context("Invalid CLAIMGATE_* environment configuration")?;
        if let Some(program) = &self.kernel {
            config.kernel.program = program.clone();
        }
        if let Some(paths) = &self.kernel_path {
            config.kernel.search_path = std::env::split_paths(paths).collect();
        }
        if let Some(runs) = &self.runs_dir {
            config.runs_dir = Some(runs.clone());
        }
        if let Some(version) = &self.contract_version {
            config.contract_version = version.clone();
        }
        config.validate().context("Invalid gateway configuration")?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Process every proposal entry in order against the current claim state
    Run {
        #[command(flatten)]
        gateway: GatewayArgs,

        /// Orchestrator identity recorded in each run
        #[arg(long, default_value = "alice")]
        orchestrator: String,

        /// Reviewer identity recorded in each run
        #[arg(long, default_value = "bob")]
        reviewer: String,

        /// Declare that self-approval was explicitly authorised
        #[arg(long)]
        self_approval_override: bool,
    },

    /// Run the authority, integrity and structure fail→fix scenarios
    Showcase {
        #[command(flatten)]
        gateway: GatewayArgs,

        /// Evidence id of the proposal entry to exercise
        #[arg(long)]
        evidence_id: String,

        /// Append denied attempts to the rejection log
        #[arg(long)]
        record: bool,

        /// Stage that must also pass for an allow to count
        #[arg(long)]
        require_stage: Option<String>,
    },

    /// Show claim state, log sizes and replay consistency
    Status {
        /// Project root
        #[arg(long, env = "CLAIMGATE_ROOT", default_value = ".")]
        root: PathBuf,
    },

    /// Check a run directory's required members and SHA256SUMS assertions
    VerifyRun {
        /// Run directory
        run_dir: PathBuf,
    },

    /// Print a proposal's canonical JSON and SHA-256 hash
    HashProposal {
        /// Project root
        #[arg(long, env = "CLAIMGATE_ROOT", default_value = ".")]
        root: PathBuf,

        /// Evidence id of the proposal entry
        #[arg(long)]
        evidence_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    claimgate_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            gateway,
            orchestrator,
            reviewer,
            self_approval_override,
        } => {
            let identities =
                Identities::humans(&orchestrator, &reviewer).with_override(self_approval_override);
            cmd_run(&gateway, identities).await
        }
        Commands::Showcase {
            gateway,
            evidence_id,
            record,
            require_stage,
        } => cmd_showcase(&gateway, &evidence_id, record, require_stage).await,
        Commands::Status { root } => cmd_status(&root),
        Commands::VerifyRun { run_dir } => cmd_verify_run(&run_dir),
        Commands::HashProposal { root, evidence_id } => cmd_hash_proposal(&root, &evidence_id),
    }
}

/// Resolve and handshake the kernel. Must succeed before any log is touched.
async fn connect_gateway(config: &GatewayConfig) -> Result<EnforcementGateway> {
    let kernel = ProcessKernel::connect(&config.kernel, &config.contract_version)
        .await
        .with_context(|| format!("Failed to connect to kernel '{}'", config.kernel.program))?;
    info!(
        executable = %kernel.executable().display(),
        kernel = %kernel.description().name,
        "kernel ready"
    );
    Ok(EnforcementGateway::new(
        Arc::new(kernel),
        config.contract_version.clone(),
    ))
}

/// Process all proposals against the replayed claim state
async fn cmd_run(args: &GatewayArgs, identities: Identities) -> Result<()> {
    let config = args.config()?;
    let layout = config.layout();
    let gateway = connect_gateway(&config).await?;

    let claim_doc = load_claim(&layout.claim).context("Failed to load claim")?;
    let rules = load_rules(&layout.rules).context("Failed to load transition rules")?;
    let proposals = load_proposals_dir(&layout.proposals).context("Failed to load proposals")?;
    let mut audit = AuditLog::open(&layout.transition_log, &layout.rejection_log)
        .context("Failed to open audit logs")?;

    // The claim document is the initial state; the log carries every commit since.
    let claim = lifecycle::replay(&claim_doc, &rules, audit.transitions())
        .context("Transition log does not replay over the claim document")?;

    println!("Claim {} is {}", claim.claim_id, claim.current_state);
    println!("Contract version: {}", gateway.contract_version());
    println!();

    let governor = Governor::new(
        layout.clone(),
        gateway,
        RunMaterializer::new(config.materializer_config()),
        AttemptPlan::single(identities),
    );
    let report = governor
        .run_batch(claim, &rules, &proposals, &mut audit)
        .await
        .context("Batch aborted")?;

    for outcome in &report.outcomes {
        for line in outcome.report_lines() {
            println!("{}", line);
        }
    }

    println!();
    println!(
        "Final state: {} -> {} ({} committed, {} denied)",
        report.initial.current_state,
        report.claim.current_state,
        report.committed(),
        report.denied()
    );
    println!("Transition log: {}", audit.transition_log().path().display());
    println!("Rejection log: {}", audit.rejection_log().path().display());
    METRICS.flush();
    Ok(())
}

/// Run the enforcement scenarios against one proposal entry
async fn cmd_showcase(
    args: &GatewayArgs,
    evidence_id: &str,
    record: bool,
    require_stage: Option<String>,
) -> Result<()> {
    let config = args.config()?;
    let layout = config.layout();
    let gateway = connect_gateway(&config).await?;
    let bound = bind_entry(&layout, evidence_id, &config.contract_version)?;

    println!("Proposal hash: {}", bound.proposal_hash);
    println!();

    let mut showcase = Showcase::new(
        gateway,
        RunMaterializer::new(config.materializer_config()),
        &layout.runs,
    );
    if let Some(stage) = require_stage {
        showcase = showcase.require_stage(stage);
    }

    let mut audit = if record {
        Some(
            AuditLog::open(&layout.transition_log, &layout.rejection_log)
                .context("Failed to open audit logs")?,
        )
    } else {
        None
    };

    let reports = showcase
        .run(&bound, &standard_scenarios(), audit.as_mut())
        .await
        .context("Showcase failed")?;

    for report in &reports {
        for line in report.report_lines() {
            println!("{}", line);
        }
        println!();
    }
    println!("All {} scenario steps behaved as expected", reports.len());
    if let Some(audit) = &audit {
        println!(
            "Recorded {} denials in {}",
            reports.iter().filter(|r| r.recorded).count(),
            audit.rejection_log().path().display()
        );
    }
    METRICS.flush();
    Ok(())
}

/// Show claim state and audit log consistency
fn cmd_status(root: &Path) -> Result<()> {
    let layout = ProjectLayout::new(root);
    let claim_doc = load_claim(&layout.claim).context("Failed to load claim")?;
    let rules = load_rules(&layout.rules).context("Failed to load transition rules")?;
    let audit = AuditLog::open(&layout.transition_log, &layout.rejection_log)
        .context("Failed to open audit logs")?;

    println!("Claim: {}", claim_doc.claim_id);
    println!("Initial state: {}", claim_doc.current_state);
    println!(
        "Transitions: {} ({})",
        audit.transitions().len(),
        layout.transition_log.display()
    );
    println!(
        "Rejections: {} ({})",
        audit.rejections().len(),
        layout.rejection_log.display()
    );

    match lifecycle::replay(&claim_doc, &rules, audit.transitions()) {
        Ok(claim) => {
            println!("Current state: {}", claim.current_state);
            let successors: Vec<&str> = rules
                .successors(&claim.current_state)
                .map(|s| s.as_str())
                .collect();
            if successors.is_empty() {
                println!("Allowed next: (none, terminal)");
            } else {
                println!("Allowed next: {}", successors.join(", "));
            }
            println!("Replay: ok");
            Ok(())
        }
        Err(e) => bail!("Replay failed: {}", e),
    }
}

/// Verify run members and digest assertions
fn cmd_verify_run(run_dir: &Path) -> Result<()> {
    if !run_dir.is_dir() {
        bail!("Run directory not found: {:?}", run_dir);
    }

    let missing = missing_members(run_dir);
    for member in &missing {
        println!("  ✗ missing {}", member.relative_path());
    }

    let manifest = IntegrityManifest::read(run_dir)
        .with_context(|| format!("Failed to read integrity manifest in {:?}", run_dir))?;
    let mismatches = manifest.verify(run_dir);
    for m in &mismatches {
        match &m.actual {
            Some(actual) => println!("  ✗ {}: expected {}, found {}", m.path, m.expected, actual),
            None => println!("  ✗ {}: asserted file is missing", m.path),
        }
    }

    if !missing.is_empty() || !mismatches.is_empty() {
        bail!(
            "Run {:?} failed verification ({} missing, {} mismatched)",
            run_dir,
            missing.len(),
            mismatches.len()
        );
    }

    if manifest.is_empty() {
        println!("✓ All members present; manifest asserts no digests");
    } else {
        println!(
            "✓ All members present; {} digest(s) verified",
            manifest.entries.len()
        );
    }
    Ok(())
}

/// Print canonical proposal JSON and its hash
fn cmd_hash_proposal(root: &Path, evidence_id: &str) -> Result<()> {
    let config = GatewayConfig::from_env(root).context("Invalid CLAIMGATE_* configuration")?;
    let bound = bind_entry(&config.layout(), evidence_id, &config.contract_version)?;
    println!("{}", bound.proposal.canonical_json()?);
    println!("{}", bound.proposal_hash);
    Ok(())
}

/// Find the proposal entry citing `evidence_id` and bind it without
/// consulting the claim's current state.
fn bind_entry(
    layout: &ProjectLayout,
    evidence_id: &str,
    default_contract_version: &str,
) -> Result<BoundProposal> {
    let rules = load_rules(&layout.rules).context("Failed to load transition rules")?;
    let proposals = load_proposals_dir(&layout.proposals).context("Failed to load proposals")?;

    let (document, entry) = proposals
        .iter()
        .find_map(|(_, doc)| {
            doc.transitions
                .iter()
                .find(|e| e.evidence_id == evidence_id)
                .map(|e| (doc, e))
        })
        .with_context(|| format!("No proposal entry cites evidence '{}'", evidence_id))?;

    let evidence = load_evidence(layout, evidence_id)
        .with_context(|| format!("Failed to load evidence '{}'", evidence_id))?;
    bind_detached(&rules, document, entry, &evidence, default_contract_version)
        .with_context(|| format!("Failed to bind proposal for '{}'", evidence_id))
}
