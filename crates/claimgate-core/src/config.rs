//! Gateway configuration.
//!
//! Defaults come from [`GatewayConfig::new`]; the `CLAIMGATE_*` environment
//! variables override them, and the CLI overrides both.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::documents::ProjectLayout;
use crate::domain::{GatewayError, Result};
use crate::kernel::KernelConfig;
use crate::run::{MaterializerConfig, CONTRACT_VERSION, DEFAULT_RUN_PREFIX};

pub const ENV_KERNEL: &str = "CLAIMGATE_KERNEL";
pub const ENV_KERNEL_PATH: &str = "CLAIMGATE_KERNEL_PATH";
pub const ENV_CONTRACT_VERSION: &str = "CLAIMGATE_CONTRACT_VERSION";
pub const ENV_RUNS_DIR: &str = "CLAIMGATE_RUNS_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Project root holding claims, rules, proposals, evidence and logs.
    pub root: PathBuf,
    /// Where runs are created; relative paths are taken from `root`.
    pub runs_dir: Option<PathBuf>,
    /// Run contract version expected from the kernel.
    pub contract_version: String,
    pub run_id_prefix: String,
    pub kernel: KernelConfig,
}

impl GatewayConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            runs_dir: None,
            contract_version: CONTRACT_VERSION.to_string(),
            run_id_prefix: DEFAULT_RUN_PREFIX.to_string(),
            kernel: KernelConfig::default(),
        }
    }

    /// Defaults overridden by the process environment.
    pub fn from_env(root: impl Into<PathBuf>) -> Result<Self> {
        Self::new(root).with_overrides(|key| std::env::var_os(key))
    }

    /// Apply `CLAIMGATE_*` overrides read through `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let text = |key: &str| -> Result<Option<String>> {
            match lookup(key) {
                None => Ok(None),
                Some(value) => value
                    .into_string()
                    .map(Some)
                    .map_err(|_| GatewayError::Config(format!("{key} is not valid UTF-8"))),
            }
        };

        if let Some(program) = text(ENV_KERNEL)? {
            self.kernel.program = program;
        }
        if let Some(paths) = lookup(ENV_KERNEL_PATH) {
            self.kernel.search_path = std::env::split_paths(&paths).collect();
        }
        if let Some(version) = text(ENV_CONTRACT_VERSION)? {
            self.contract_version = version;
        }
        if let Some(runs) = lookup(ENV_RUNS_DIR) {
            self.runs_dir = Some(PathBuf::from(runs));
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.contract_version.trim().is_empty() {
            return Err(GatewayError::Config("contract version is empty".to_string()));
        }
        if self.kernel.program.trim().is_empty() {
            return Err(GatewayError::Config("kernel program is empty".to_string()));
        }
        if self.run_id_prefix.is_empty()
            || !self
                .run_id_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(GatewayError::Config(format!(
                "run id prefix '{}' must be non-empty ASCII letters, digits, '-' or '_'",
                self.run_id_prefix
            )));
        }
        Ok(())
    }

    pub fn layout(&self) -> ProjectLayout {
        let layout = ProjectLayout::new(&self.root);
        match &self.runs_dir {
            Some(runs) => layout.with_runs_dir(runs),
            None => layout,
        }
    }

    pub fn materializer_config(&self) -> MaterializerConfig {
        MaterializerConfig {
            contract_version: self.contract_version.clone(),
            run_id_prefix: self.run_id_prefix.clone(),
            ..MaterializerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let map: HashMap<String, OsString> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), OsString::from(v)))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::new("/proj");
        assert_eq!(config.contract_version, "0.1.0");
        assert_eq!(config.kernel.program, "claimgate-kernel");
        assert_eq!(config.layout().runs, PathBuf::from("/proj/runs"));
        config.validate().unwrap();
    }

    #[test]
    fn test_env_overrides() {
        let config = GatewayConfig::new("/proj")
            .with_overrides(lookup(&[
                (ENV_KERNEL, "cricore"),
                (ENV_KERNEL_PATH, "/opt/a:/opt/b"),
                (ENV_CONTRACT_VERSION, "0.2.0"),
                (ENV_RUNS_DIR, "out/runs"),
            ]))
            .unwrap();
        assert_eq!(config.kernel.program, "cricore");
        assert_eq!(
            config.kernel.search_path,
            vec![PathBuf::from("/opt/a"), PathBuf::from("/opt/b")]
        );
        assert_eq!(config.contract_version, "0.2.0");
        assert_eq!(config.layout().runs, PathBuf::from("/proj/out/runs"));
        assert_eq!(config.materializer_config().contract_version, "0.2.0");
    }

    #[test]
    fn test_empty_contract_version_is_config_error() {
        let err = GatewayConfig::new("/proj")
            .with_overrides(lookup(&[(ENV_CONTRACT_VERSION, " ")]))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
        assert!(err.aborts_batch());
    }

    #[test]
    fn test_bad_prefix_rejected() {
        let mut config = GatewayConfig::new("/proj");
        config.run_id_prefix = "../RUN".to_string();
        assert!(config.validate().is_err());
    }
}
