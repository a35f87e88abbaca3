//! Post-run cleanup of written files
//!
//! Runs after the traversal has finished, over the files already on disk.

use crate::output::traits::{OutputError, OutputResult};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Counts from one cleanup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub files_seen: usize,
    pub files_changed: usize,
}

/// A pass over a finished output directory
pub trait PostProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Processes every `*.<extension>` file in `dir`
    fn process(&self, dir: &Path, extension: &str) -> OutputResult<CleanupReport>;
}

/// Normalizes text files line by line
///
/// Trims every line and drops blank lines. With `dedup`, a line identical to
/// the line before it is dropped as well.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineCleaner {
    pub dedup: bool,
}

impl LineCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dedup(mut self, dedup: bool) -> Self {
        self.dedup = dedup;
        self
    }

    /// Returns the cleaned text
    pub fn clean_text(&self, text: &str) -> String {
        let mut lines: Vec<&str> = Vec::new();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if self.dedup && lines.last() == Some(&line) {
                continue;
            }
            lines.push(line);
        }

        let mut out = lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }
}

impl PostProcessor for LineCleaner {
    fn name(&self) -> &'static str {
        "line-cleaner"
    }

    fn process(&self, dir: &Path, extension: &str) -> OutputResult<CleanupReport> {
        let mut report = CleanupReport::default();

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(extension) {
                continue;
            }
            report.files_seen += 1;

            let original = fs::read_to_string(&path)?;
            let cleaned = self.clean_text(&original);
            if cleaned == original {
                continue;
            }

            let wrap = |source| OutputError::Write {
                path: path.clone(),
                source,
            };
            let mut tmp = NamedTempFile::new_in(dir).map_err(wrap)?;
            tmp.write_all(cleaned.as_bytes()).map_err(wrap)?;
            tmp.persist(&path).map_err(|e| wrap(e.error))?;
            report.files_changed += 1;
        }

        tracing::info!(
            "{}: cleaned {} of {} files in {}",
            self.name(),
            report.files_changed,
            report.files_seen,
            dir.display()
        );
        Ok(report)
    }
}
