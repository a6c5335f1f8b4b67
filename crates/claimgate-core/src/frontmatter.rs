//! Front-matter documents: `---\n<header>---\n<body>`.
//!
//! The header is kept as raw text and written back byte-for-byte; only the
//! body is ever re-serialized.

use std::path::Path;

use crate::domain::{GatewayError, Result};

const DELIMITER: &str = "---";

/// A document split into its verbatim header block and its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontMatter {
    /// Header text between the delimiters, including its trailing newline.
    pub header: String,
    pub body: String,
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end_matches(['\r', '\n']) == DELIMITER
}

impl FrontMatter {
    pub fn new(header: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            body: body.into(),
        }
    }

    /// Whether `text` opens with a `---` header line.
    pub fn has_header(text: &str) -> bool {
        text.split_inclusive('\n').next().is_some_and(is_delimiter)
    }

    /// Split `text`. The first line must be `---`; the header runs to the
    /// next `---` line.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let mut lines = text.split_inclusive('\n');
        match lines.next() {
            Some(first) if is_delimiter(first) => {}
            _ => return Err("document does not start with a '---' header block".to_string()),
        }

        let mut header = String::new();
        for line in lines.by_ref() {
            if is_delimiter(line) {
                let body: String = lines.collect();
                return Ok(Self { header, body });
            }
            header.push_str(line);
        }
        Err("header block is not closed by '---'".to_string())
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.header.len() + self.body.len() + 8);
        out.push_str(DELIMITER);
        out.push('\n');
        out.push_str(&self.header);
        if !self.header.is_empty() && !self.header.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(DELIMITER);
        out.push('\n');
        out.push_str(&self.body);
        out
    }

    /// Same header, new body.
    pub fn with_body(&self, body: impl Into<String>) -> Self {
        Self {
            header: self.header.clone(),
            body: body.into(),
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text).map_err(|reason| GatewayError::document(path, reason))
    }
}
