//! Run identifiers: `<PREFIX>-<YYYYMMDDTHHMMSSZ>-<microseconds>`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Default prefix for production runs.
pub const DEFAULT_RUN_PREFIX: &str = "RUN";

const MAX_ALLOCATION_ATTEMPTS: u32 = 64;

/// Format a run id for `now`.
pub fn format_run_id(prefix: &str, now: DateTime<Utc>) -> String {
    format!(
        "{prefix}-{}-{}",
        now.format("%Y%m%dT%H%M%SZ"),
        now.format("%6f")
    )
}

/// Create a fresh, exclusively owned run directory under `runs_root`.
///
/// Directory creation is exclusive, so two attempts in the same microsecond
/// cannot share a directory: the loser retries with a numeric suffix.
pub fn allocate_run_dir(runs_root: &Path, prefix: &str) -> std::io::Result<(String, PathBuf)> {
    std::fs::create_dir_all(runs_root)?;
    let base = format_run_id(prefix, Utc::now());
    for attempt in 0..MAX_ALLOCATION_ATTEMPTS {
        let run_id = if attempt == 0 {
            base.clone()
        } else {
            format!("{base}-{attempt}")
        };
        let run_dir = runs_root.join(&run_id);
        match std::fs::create_dir(&run_dir) {
            Ok(()) => return Ok((run_id, run_dir)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("could not allocate a unique run directory for {base}"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_run_id() {
        let now = Utc.with_ymd_and_hms(2026, 2, 18, 9, 5, 7).unwrap()
            + chrono::Duration::microseconds(42);
        assert_eq!(
            format_run_id("SHOWCASE-RUN", now),
            "SHOWCASE-RUN-20260218T090507Z-000042"
        );
    }

    #[test]
    fn test_rapid_allocations_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let mut ids = std::collections::HashSet::new();
        for _ in 0..50 {
            let (run_id, run_dir) = allocate_run_dir(dir.path(), "RUN").unwrap();
            assert!(run_dir.is_dir());
            assert!(ids.insert(run_id));
        }
    }
}
