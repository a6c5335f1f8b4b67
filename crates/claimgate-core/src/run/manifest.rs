//! `SHA256SUMS.txt` integrity manifest.
//!
//! Format follows `sha256sum`: one `<hex digest>  <relative path>` line per
//! asserted file; lines starting with `#` are comments. A manifest without
//! entries asserts nothing and only satisfies presence.

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use super::layout::MANIFEST_FILE;
use crate::domain::digest::sha256_hex;
use crate::domain::{GatewayError, Result};

const PLACEHOLDER: &str = "# Placeholder manifest\n# No digests asserted; integrity is not exercised for this run.\n";

/// One asserted file digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub digest: String,
    pub path: String,
}

/// A recorded digest that no longer matches the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestMismatch {
    pub path: String,
    pub expected: String,
    /// `None` when the file is missing.
    pub actual: Option<String>,
}

/// Parsed or computed digest assertions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityManifest {
    pub entries: Vec<ManifestEntry>,
}

fn check_relative(rel: &str) -> Result<()> {
    let path = Path::new(rel);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if rel.is_empty() || escapes {
        return Err(GatewayError::document(
            MANIFEST_FILE,
            format!("path '{rel}' is not inside the run directory"),
        ));
    }
    Ok(())
}

impl IntegrityManifest {
    /// Hash each of `paths` (relative to `run_dir`) as it exists right now.
    pub fn compute(run_dir: &Path, paths: &[String]) -> Result<Self> {
        let mut entries = Vec::with_capacity(paths.len());
        for rel in paths {
            check_relative(rel)?;
            let bytes = std::fs::read(run_dir.join(rel))?;
            entries.push(ManifestEntry {
                digest: sha256_hex(&bytes),
                path: rel.clone(),
            });
        }
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return PLACEHOLDER.to_string();
        }
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&format!("{}  {}\n", entry.digest, entry.path));
        }
        out
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim_end();
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }
            let (digest, rest) = line.split_once(char::is_whitespace).ok_or_else(|| {
                GatewayError::document(MANIFEST_FILE, format!("line {}: missing path", lineno + 1))
            })?;
            // `sha256sum -b` marks binary mode with a leading '*'.
            let path = rest.trim_start().trim_start_matches('*');
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(GatewayError::document(
                    MANIFEST_FILE,
                    format!("line {}: '{digest}' is not a sha256 digest", lineno + 1),
                ));
            }
            check_relative(path)?;
            entries.push(ManifestEntry {
                digest: digest.to_ascii_lowercase(),
                path: path.to_string(),
            });
        }
        Ok(Self { entries })
    }

    pub fn read(run_dir: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(run_dir.join(MANIFEST_FILE))?;
        Self::parse(&text)
    }

    pub fn write(&self, run_dir: &Path) -> Result<()> {
        std::fs::write(run_dir.join(MANIFEST_FILE), self.render())?;
        Ok(())
    }

    /// Recompute every asserted digest against `run_dir`.
    pub fn verify(&self, run_dir: &Path) -> Vec<ManifestMismatch> {
        self.entries
            .iter()
            .filter_map(|entry| {
                let actual = std::fs::read(run_dir.join(&entry.path))
                    .ok()
                    .map(|bytes| sha256_hex(&bytes));
                match actual {
                    Some(ref digest) if digest == &entry.digest => None,
                    actual => Some(ManifestMismatch {
                        path: entry.path.clone(),
                        expected: entry.digest.clone(),
                        actual,
                    }),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_parses_to_empty() {
        let manifest = IntegrityManifest::default();
        let parsed = IntegrityManifest::parse(&manifest.render()).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_compute_and_verify_detects_change() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report.md"), "# Report\n").unwrap();

        let manifest =
            IntegrityManifest::compute(dir.path(), &["report.md".to_string()]).unwrap();
        assert!(manifest.verify(dir.path()).is_empty());

        std::fs::write(dir.path().join("report.md"), "# Report\nTAMPER\n").unwrap();
        let mismatches = manifest.verify(dir.path());
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].path, "report.md");
        assert!(mismatches[0].actual.is_some());
    }

    #[test]
    fn test_verify_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        let manifest = IntegrityManifest::compute(dir.path(), &["a.txt".to_string()]).unwrap();
        std::fs::remove_file(dir.path().join("a.txt")).unwrap();
        assert_eq!(manifest.verify(dir.path())[0].actual, None);
    }

    #[test]
    fn test_parse_sha256sum_output() {
        let digest = sha256_hex(b"x");
        let text = format!("# comment\n{digest}  report.md\n{digest} *validation/invariant_results.json\n\n");
        let manifest = IntegrityManifest::parse(&text).unwrap();
        assert_eq!(manifest.entries.len(), 2);
        assert_eq!(manifest.entries[1].path, "validation/invariant_results.json");
    }

    #[test]
    fn test_parse_rejects_bad_digest() {
        assert!(IntegrityManifest::parse("abc  report.md\n").is_err());
    }

    #[test]
    fn test_paths_must_stay_inside_run() {
        let dir = tempfile::tempdir().unwrap();
        assert!(IntegrityManifest::compute(dir.path(), &["../secret".to_string()]).is_err());
        let digest = sha256_hex(b"x");
        assert!(IntegrityManifest::parse(&format!("{digest}  /etc/passwd\n")).is_err());
    }
}
