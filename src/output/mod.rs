//! Output module for persisting run results
//!
//! This module handles:
//! - Validating records before they are written
//! - Writing chapters, metadata and the cover image into one flat directory
//! - Optional cleanup passes over a finished directory

mod cleanup;
mod directory;
mod traits;

pub use cleanup::{CleanupReport, LineCleaner, PostProcessor};
pub use directory::{DirectorySink, COVER_FILE, INFO_FILE_STEM};
pub use traits::{
    render_chapter, render_info, validate_chapter, validate_info, OutputError, OutputResult,
    OutputSink, ValidationError,
};
