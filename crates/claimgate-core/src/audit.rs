//! Audit log manager.
//!
//! Two append-only logs, each a front-matter file whose body is a JSON
//! array: the transition log (committed transitions) and the rejection log
//! (policy rejections and kernel denials). The header block is preserved
//! verbatim; every append rewrites the whole file through a temp file in
//! the same directory followed by a rename. Single writer assumed.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::domain::{GatewayError, LogEntry, RejectionEntry, Result};
use crate::frontmatter::FrontMatter;

/// Header written into a new transition log.
pub const DEFAULT_TRANSITION_HEADER: &str = "title: \"Claim transition log\"\nfiletype: \"log\"\ndescription: \"Append-only record of committed claim transitions.\"\n";

/// Header written into a new rejection log.
pub const DEFAULT_REJECTION_HEADER: &str = "title: \"Claim rejection log\"\nfiletype: \"log\"\ndescription: \"Append-only record of rejected and denied transition attempts.\"\n";

/// One persisted, ordered log.
#[derive(Debug, Clone)]
pub struct LogFile<T> {
    path: PathBuf,
    document: FrontMatter,
    entries: Vec<T>,
}

impl<T> LogFile<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Load `path`; a missing file is an empty log with `default_header`.
    pub fn load(path: impl Into<PathBuf>, default_header: &str) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                document: FrontMatter::new(default_header, "[]\n"),
                entries: Vec::new(),
            });
        }

        let text = std::fs::read_to_string(&path)?;
        // A log without a header block is a bare JSON array.
        let document = if FrontMatter::has_header(&text) {
            FrontMatter::parse(&text).map_err(|reason| GatewayError::document(&path, reason))?
        } else {
            FrontMatter::new("", text)
        };
        let entries = if document.body.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&document.body)
                .map_err(|e| GatewayError::document(&path, e.to_string()))?
        };
        Ok(Self {
            path,
            document,
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &str {
        &self.document.header
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append and persist. On a failed write the entry is not kept.
    pub fn append(&mut self, entry: T) -> Result<()> {
        self.entries.push(entry);
        if let Err(e) = self.persist() {
            self.entries.pop();
            return Err(e);
        }
        Ok(())
    }

    fn persist(&mut self) -> Result<()> {
        let mut body = serde_json::to_string_pretty(&self.entries)?;
        body.push('\n');
        let document = self.document.with_body(body);

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(document.render().as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        self.document = document;
        Ok(())
    }
}

/// The transition and rejection logs of one project.
#[derive(Debug, Clone)]
pub struct AuditLog {
    transitions: LogFile<LogEntry>,
    rejections: LogFile<RejectionEntry>,
}

impl AuditLog {
    pub fn open(transition_log: impl Into<PathBuf>, rejection_log: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            transitions: LogFile::load(transition_log, DEFAULT_TRANSITION_HEADER)?,
            rejections: LogFile::load(rejection_log, DEFAULT_REJECTION_HEADER)?,
        })
    }

    pub fn append_transition(&mut self, entry: LogEntry) -> Result<()> {
        self.transitions.append(entry)
    }

    pub fn append_rejection(&mut self, entry: RejectionEntry) -> Result<()> {
        self.rejections.append(entry)
    }

    pub fn transitions(&self) -> &[LogEntry] {
        self.transitions.entries()
    }

    pub fn rejections(&self) -> &[RejectionEntry] {
        self.rejections.entries()
    }

    pub fn transition_log(&self) -> &LogFile<LogEntry> {
        &self.transitions
    }

    pub fn rejection_log(&self) -> &LogFile<RejectionEntry> {
        &self.rejections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BoundProposal, Proposal, StageResult, PROPOSAL_TYPE};

    fn bound() -> BoundProposal {
        BoundProposal::new(Proposal {
            proposal_id: Some("proposal-001".to_string()),
            kind: PROPOSAL_TYPE.to_string(),
            claim_id: "claim-001".to_string(),
            evidence_id: "ev-002-supported".to_string(),
            from: "proposed".into(),
            to: "supported".into(),
            contract_version: "0.1.0".to_string(),
            authority_requirements: Vec::new(),
        })
        .unwrap()
    }

    #[test]
    fn test_missing_log_is_empty_with_default_header() {
        let dir = tempfile::tempdir().unwrap();
        let log: LogFile<LogEntry> =
            LogFile::load(dir.path().join("transition-log.json"), DEFAULT_TRANSITION_HEADER)
                .unwrap();
        assert!(log.is_empty());
        assert_eq!(log.header(), DEFAULT_TRANSITION_HEADER);
        assert!(!log.path().exists());
    }

    #[test]
    fn test_append_creates_file_with_default_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transitions").join("transition-log.json");
        let mut log: LogFile<LogEntry> = LogFile::load(&path, DEFAULT_TRANSITION_HEADER).unwrap();
        log.append(LogEntry::committed(&bound(), "RUN-1")).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(&format!("---\n{DEFAULT_TRANSITION_HEADER}---\n[")));
        let reloaded: LogFile<LogEntry> = LogFile::load(&path, "").unwrap();
        assert_eq!(reloaded.entries(), log.entries());
    }

    #[test]
    fn test_existing_header_preserved_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transition-log.json");
        let header = "title: \"Transition log\"\n# hand-written note, keep\nanchors:\n  - \"LOG-v0.2.0\"\n";
        std::fs::write(&path, format!("---\n{header}---\n[]")).unwrap();

        let mut log: LogFile<LogEntry> = LogFile::load(&path, DEFAULT_TRANSITION_HEADER).unwrap();
        log.append(LogEntry::committed(&bound(), "RUN-1")).unwrap();
        log.append(LogEntry::committed(&bound(), "RUN-2")).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(&format!("---\n{header}---\n")));
        let doc = FrontMatter::parse(&text).unwrap();
        let entries: Vec<LogEntry> = serde_json::from_str(&doc.body).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].run_id, "RUN-2");
    }

    #[test]
    fn test_legacy_log_loads_and_keeps_growing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transition-log.json");
        std::fs::write(
            &path,
            "---\ntitle: legacy\n---\n[\n  {\"timestamp\": \"2026-02-13T10:00:00+00:00\", \"claim_id\": \"claim-001\", \"evidence_id\": \"ev-002-supported\", \"from\": \"proposed\", \"to\": \"supported\", \"cricore_run_id\": \"DEMO-RUN-1\"}\n]",
        )
        .unwrap();

        let mut log: LogFile<LogEntry> = LogFile::load(&path, DEFAULT_TRANSITION_HEADER).unwrap();
        assert_eq!(log.len(), 1);
        log.append(LogEntry::committed(&bound(), "RUN-2")).unwrap();
        let reloaded: LogFile<LogEntry> = LogFile::load(&path, "").unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.entries()[0].run_id, "DEMO-RUN-1");
    }

    #[test]
    fn test_bare_json_log_loads_with_empty_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rejections-log.json");
        std::fs::write(&path, "[]\n").unwrap();

        let mut log: LogFile<RejectionEntry> =
            LogFile::load(&path, DEFAULT_REJECTION_HEADER).unwrap();
        assert!(log.is_empty());
        assert_eq!(log.header(), "");

        log.append(RejectionEntry::denied(&bound(), "RUN-1", Vec::new()))
            .unwrap();
        let reloaded: LogFile<RejectionEntry> =
            LogFile::load(&path, DEFAULT_REJECTION_HEADER).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.header(), "");
    }

    #[test]
    fn test_unclosed_header_is_a_document_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transition-log.json");
        std::fs::write(&path, "---\ntitle: x\n[]").unwrap();
        let err = LogFile::<LogEntry>::load(&path, DEFAULT_TRANSITION_HEADER).unwrap_err();
        assert!(matches!(err, GatewayError::Document { .. }));
    }

    #[test]
    fn test_corrupt_body_is_a_document_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rejections-log.json");
        std::fs::write(&path, "---\ntitle: x\n---\n{not json").unwrap();
        let err = LogFile::<RejectionEntry>::load(&path, DEFAULT_REJECTION_HEADER).unwrap_err();
        assert!(matches!(err, GatewayError::Document { .. }));
    }

    #[test]
    fn test_audit_log_keeps_logs_separate() {
        let dir = tempfile::tempdir().unwrap();
        let mut audit = AuditLog::open(
            dir.path().join("transition-log.json"),
            dir.path().join("rejections-log.json"),
        )
        .unwrap();
        audit
            .append_rejection(RejectionEntry::denied(
                &bound(),
                "RUN-1",
                vec![StageResult::fail("independence", "authority", "self approval")],
            ))
            .unwrap();
        audit
            .append_transition(LogEntry::committed(&bound(), "RUN-2"))
            .unwrap();

        let reopened = AuditLog::open(
            dir.path().join("transition-log.json"),
            dir.path().join("rejections-log.json"),
        )
        .unwrap();
        assert_eq!(reopened.transitions().len(), 1);
        assert_eq!(reopened.rejections().len(), 1);
        assert_eq!(reopened.rejections()[0].stage_results.len(), 1);
    }
}
