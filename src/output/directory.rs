//! Flat-directory output sink
//!
//! Layout of one run:
//!
//! ```text
//! <dir>/foreword.<ext>   metadata
//! <dir>/cover.jpg        cover image
//! <dir>/<index>.<ext>    one file per chapter
//! ```
//!
//! Each file is written to a temporary file in the same directory and renamed
//! over its final name, so readers never observe a half-written file.

use crate::output::traits::{
    render_chapter, render_info, validate_chapter, validate_info, OutputError, OutputResult,
    OutputSink, ValidationError,
};
use crate::site::{ChapterRecord, InfoRecord};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File stem of the metadata file
pub const INFO_FILE_STEM: &str = "foreword";

/// File name of the cover image
pub const COVER_FILE: &str = "cover.jpg";

#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    extension: String,
}

impl DirectorySink {
    /// Creates a sink writing into `dir`, which must already exist
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    pub fn chapter_path(&self, index: u32) -> PathBuf {
        self.dir.join(format!("{}.{}", index, self.extension))
    }

    pub fn info_path(&self) -> PathBuf {
        self.dir.join(format!("{}.{}", INFO_FILE_STEM, self.extension))
    }

    pub fn cover_path(&self) -> PathBuf {
        self.dir.join(COVER_FILE)
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> OutputResult<()> {
        if path.exists() {
            tracing::warn!("Overwriting existing file {}", path.display());
        }

        let wrap = |source| OutputError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(wrap)?;
        tmp.write_all(contents).map_err(wrap)?;
        tmp.flush().map_err(wrap)?;
        tmp.persist(path).map_err(|e| wrap(e.error))?;

        tracing::debug!("Wrote {} ({} bytes)", path.display(), contents.len());
        Ok(())
    }
}

impl OutputSink for DirectorySink {
    fn location(&self) -> &Path {
        &self.dir
    }

    fn write_info(&self, record: &InfoRecord) -> OutputResult<()> {
        validate_info(record)?;
        self.write_atomic(&self.info_path(), render_info(record).as_bytes())
    }

    fn write_chapter(&self, record: &ChapterRecord) -> OutputResult<()> {
        validate_chapter(record)?;
        self.write_atomic(
            &self.chapter_path(record.index),
            render_chapter(record).as_bytes(),
        )
    }

    fn write_cover(&self, bytes: &[u8]) -> OutputResult<()> {
        if bytes.is_empty() {
            return Err(ValidationError {
                field: "cover",
                index: None,
            }
            .into());
        }
        self.write_atomic(&self.cover_path(), bytes)
    }
}
