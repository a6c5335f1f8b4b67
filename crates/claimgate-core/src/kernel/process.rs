//! Out-of-process decision kernel.
//!
//! Protocol:
//! - `<kernel> describe` prints `{name, protocol_version, contract_versions}`.
//! - `<kernel> evaluate --run-dir <dir> --expected-contract-version <v>`
//!   reads the run context JSON on stdin and prints either a JSON array of
//!   stage results (protocol 1) or `{stages, commit_allowed}` (protocol 2).
//!
//! The executable is resolved and checked once in [`ProcessKernel::connect`];
//! every evaluation spawns a fresh process, so nothing about a previous
//! kernel build survives between calls.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{DecisionKernel, KernelVerdict};
use crate::domain::{GatewayError, Result, StageResult};
use crate::obs;
use crate::run::RunContext;

/// Protocol versions this gateway can read.
pub const SUPPORTED_PROTOCOLS: [u32; 2] = [1, 2];

/// Default kernel executable name.
pub const DEFAULT_KERNEL_PROGRAM: &str = "claimgate-kernel";

/// Where and how to find the kernel executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Executable name, or a path when it contains a separator.
    pub program: String,
    /// Directories searched for `program`. Empty means `PATH`.
    #[serde(default)]
    pub search_path: Vec<PathBuf>,
    /// Arguments placed before the subcommand on every invocation.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_KERNEL_PROGRAM.to_string(),
            search_path: Vec::new(),
            args: Vec::new(),
        }
    }
}

impl KernelConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Locate the executable without running it.
    pub fn resolve(&self) -> Result<PathBuf> {
        let program = Path::new(&self.program);
        if self.program.contains(std::path::MAIN_SEPARATOR) || self.program.contains('/') {
            if program.is_file() {
                return Ok(program.to_path_buf());
            }
            return Err(GatewayError::KernelUnavailable {
                program: self.program.clone(),
                searched: program.display().to_string(),
            });
        }

        let dirs: Vec<PathBuf> = if self.search_path.is_empty() {
            std::env::var_os("PATH")
                .map(|p| std::env::split_paths(&p).collect())
                .unwrap_or_default()
        } else {
            self.search_path.clone()
        };

        dirs.iter()
            .map(|dir| dir.join(&self.program))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| GatewayError::KernelUnavailable {
                program: self.program.clone(),
                searched: dirs
                    .iter()
                    .map(|d| d.display().to_string())
                    .collect::<Vec<_>>()
                    .join(":"),
            })
    }
}

/// Answer of `<kernel> describe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelDescription {
    pub name: String,
    pub protocol_version: u32,
    #[serde(default)]
    pub contract_versions: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireVerdict {
    Stages(Vec<StageResult>),
    Flagged {
        stages: Vec<StageResult>,
        commit_allowed: bool,
    },
}

impl From<WireVerdict> for KernelVerdict {
    fn from(wire: WireVerdict) -> Self {
        match wire {
            WireVerdict::Stages(stages) => KernelVerdict::from_stages(stages),
            WireVerdict::Flagged {
                stages,
                commit_allowed,
            } => KernelVerdict::with_flag(stages, commit_allowed),
        }
    }
}

/// A verified, resolved kernel executable.
#[derive(Debug, Clone)]
pub struct ProcessKernel {
    executable: PathBuf,
    args: Vec<String>,
    description: KernelDescription,
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    let start = trimmed
        .char_indices()
        .rev()
        .nth(499)
        .map(|(i, _)| i)
        .unwrap_or(0);
    trimmed[start..].to_string()
}

impl ProcessKernel {
    /// Resolve the kernel and check it supports `expected_contract_version`.
    pub async fn connect(config: &KernelConfig, expected_contract_version: &str) -> Result<Self> {
        let executable = config.resolve()?;
        let output = Command::new(&executable)
            .args(&config.args)
            .arg("describe")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                GatewayError::KernelFailure(format!("{}: describe: {e}", executable.display()))
            })?;

        if !output.status.success() {
            return Err(GatewayError::KernelFailure(format!(
                "{}: describe exited with {}: {}",
                executable.display(),
                output.status,
                stderr_tail(&output.stderr)
            )));
        }

        let description: KernelDescription = serde_json::from_slice(&output.stdout)
            .map_err(|e| GatewayError::KernelProtocol(format!("describe output: {e}")))?;

        if !SUPPORTED_PROTOCOLS.contains(&description.protocol_version) {
            return Err(GatewayError::KernelIncompatible(format!(
                "kernel '{}' speaks protocol {}, supported: {:?}",
                description.name, description.protocol_version, SUPPORTED_PROTOCOLS
            )));
        }
        if !description
            .contract_versions
            .iter()
            .any(|v| v == expected_contract_version)
        {
            return Err(GatewayError::KernelIncompatible(format!(
                "kernel '{}' does not support run contract {expected_contract_version} (supports {:?})",
                description.name, description.contract_versions
            )));
        }

        obs::emit_kernel_resolved(
            &executable.display().to_string(),
            &description.name,
            description.protocol_version,
        );

        Ok(Self {
            executable,
            args: config.args.clone(),
            description,
        })
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn description(&self) -> &KernelDescription {
        &self.description
    }
}

#[async_trait]
impl DecisionKernel for ProcessKernel {
    async fn evaluate(
        &self,
        run_dir: &Path,
        expected_contract_version: &str,
        context: &RunContext,
    ) -> Result<KernelVerdict> {
        let payload = serde_json::to_vec(context)?;

        let mut child = Command::new(&self.executable)
            .args(&self.args)
            .arg("evaluate")
            .arg("--run-dir")
            .arg(run_dir)
            .arg("--expected-contract-version")
            .arg(expected_contract_version)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                GatewayError::KernelFailure(format!("{}: evaluate: {e}", self.executable.display()))
            })?;

        // stdin is fed while stdout/stderr drain; a kernel that answers
        // before reading its input must not fill a pipe and stall.
        let stdin = child.stdin.take();
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(&payload).await {
                // The kernel may exit without reading; its status decides.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());

        let output =
            output.map_err(|e| GatewayError::KernelFailure(format!("waiting for kernel: {e}")))?;
        fed.map_err(|e| GatewayError::KernelFailure(format!("writing run context: {e}")))?;

        if !output.status.success() {
            return Err(GatewayError::KernelFailure(format!(
                "evaluate exited with {}: {}",
                output.status,
                stderr_tail(&output.stderr)
            )));
        }

        let wire: WireVerdict = serde_json::from_slice(&output.stdout)
            .map_err(|e| GatewayError::KernelProtocol(format!("evaluate output: {e}")))?;
        let verdict = KernelVerdict::from(wire);
        debug!(
            run_dir = %run_dir.display(),
            stages = verdict.stages.len(),
            commit_allowed = ?verdict.commit_allowed,
            "kernel verdict received"
        );
        Ok(verdict)
    }
}
