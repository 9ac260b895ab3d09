//! Markdown export of report messages.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::session::Message;

/// A finalized report ready to be written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportExport {
    file_name: String,
    contents: String,
}

impl ReportExport {
    /// Returns `None` unless `message` is a non-empty assistant report.
    pub fn from_message(message: &Message) -> Option<Self> {
        if !message.is_report() || message.content().trim().is_empty() {
            return None;
        }

        Some(Self {
            file_name: format!(
                "Financial_Analysis_{}.md",
                message.created_at().format("%Y%m%d_%H%M%S")
            ),
            contents: message.content().to_string(),
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Writes the report into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;

        let path = dir.join(&self.file_name);
        fs::write(&path, &self.contents)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;

        tracing::info!(path = %path.display(), bytes = self.contents.len(), "report exported");
        Ok(path)
    }
}
