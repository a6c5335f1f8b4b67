//! Per-stage verdicts reported by the decision kernel.

use serde::{Deserialize, Serialize};

/// Result of one enforcement dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    /// Stage identifier (e.g. `independence`, `integrity`).
    pub stage_id: String,
    pub passed: bool,
    /// Failure classifications, empty when passed.
    #[serde(default)]
    pub failure_classes: Vec<String>,
    #[serde(default)]
    pub messages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_at_utc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<String>,
}

impl StageResult {
    pub fn pass(stage_id: impl Into<String>) -> Self {
        Self {
            stage_id: stage_id.into(),
            passed: true,
            failure_classes: Vec::new(),
            messages: Vec::new(),
            checked_at_utc: None,
            engine_version: None,
        }
    }

    pub fn fail(
        stage_id: impl Into<String>,
        failure_class: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            stage_id: stage_id.into(),
            passed: false,
            failure_classes: vec![failure_class.into()],
            messages: vec![message.into()],
            checked_at_utc: None,
            engine_version: None,
        }
    }

    /// `stage: OK` / `stage: FAILED` followed by indented messages.
    pub fn summary_lines(&self) -> Vec<String> {
        if self.passed {
            return vec![format!("{}: OK", self.stage_id)];
        }
        let mut lines = vec![format!("{}: FAILED", self.stage_id)];
        lines.extend(self.messages.iter().map(|m| format!("  - {m}")));
        lines
    }
}
