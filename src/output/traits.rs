//! Output sink trait and record validation
//!
//! This module defines the interface the engine persists records through,
//! the errors it reports, and the required-field checks every sink applies
//! before a byte reaches disk.

use crate::site::{ChapterRecord, InfoRecord};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A record had an empty required field
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Missing required field '{field}'{}", .index.map(|i| format!(" in chapter {}", i)).unwrap_or_default())]
pub struct ValidationError {
    /// Name of the offending field
    pub field: &'static str,

    /// Chapter index, for chapter records
    pub index: Option<u32>,
}

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for the records of one run
///
/// Implementations validate every record before writing it and write each
/// file all-or-nothing. They must be safe to call from the chapter loop and
/// the cover task at the same time.
pub trait OutputSink: Send + Sync {
    /// Directory the sink writes into
    fn location(&self) -> &Path;

    /// Persists the book metadata
    fn write_info(&self, record: &InfoRecord) -> OutputResult<()>;

    /// Persists one chapter under its index
    fn write_chapter(&self, record: &ChapterRecord) -> OutputResult<()>;

    /// Persists the cover image
    fn write_cover(&self, bytes: &[u8]) -> OutputResult<()>;
}

fn require(value: &str, field: &'static str, index: Option<u32>) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError { field, index })
    } else {
        Ok(())
    }
}

/// Checks that every field except the cover URL is non-empty
pub fn validate_info(record: &InfoRecord) -> Result<(), ValidationError> {
    require(&record.title, "title", None)?;
    require(&record.author, "author", None)?;
    if record.types.iter().all(|t| t.trim().is_empty()) {
        return Err(ValidationError {
            field: "types",
            index: None,
        });
    }
    require(&record.foreword, "foreword", None)?;
    require(&record.source_url, "source_url", None)
}

/// Checks a chapter's index and required fields
pub fn validate_chapter(record: &ChapterRecord) -> Result<(), ValidationError> {
    let index = Some(record.index);
    if record.index == 0 {
        return Err(ValidationError {
            field: "index",
            index,
        });
    }
    require(&record.title, "title", index)?;
    require(&record.content, "content", index)?;
    require(&record.source_url, "source_url", index)
}

/// Renders the metadata file: title, author, types, source URL, foreword
pub fn render_info(record: &InfoRecord) -> String {
    let types: Vec<&str> = record
        .types
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();

    let mut out = String::new();
    for line in [
        record.title.trim(),
        record.author.trim(),
        &types.join(", "),
        record.source_url.trim(),
        record.foreword.trim(),
    ] {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Renders a chapter file: title line, then the content
pub fn render_chapter(record: &ChapterRecord) -> String {
    format!("{}\n{}\n", record.title.trim(), record.content.trim_end())
}
