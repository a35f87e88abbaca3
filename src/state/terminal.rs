use crate::{CrawlError, NovelError};
use std::fmt;

/// Why a run finished in the `DONE` state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// The site's navigation reported no next chapter
    EndOfBook,

    /// The configured stop index was saved
    StopIndexReached,
}

/// Classification of why a run stopped
#[derive(Debug)]
pub enum TerminalReason {
    /// Natural or requested end of the run
    Done(StopCause),

    /// Cancellation was observed between pages; not an error
    Cancelled,

    /// A fatal error ended the run; files written so far remain on disk
    Failed(CrawlError),
}

impl TerminalReason {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Short uppercase label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::Done(_) => "DONE",
            Self::Cancelled => "CANCELLED",
            Self::Failed(_) => "FAILED",
        }
    }
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done(StopCause::EndOfBook) => write!(f, "DONE (end of book)"),
            Self::Done(StopCause::StopIndexReached) => write!(f, "DONE (stop index reached)"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Failed(e) => write!(f, "FAILED ({})", e),
        }
    }
}

/// Outcome of one traversal
#[derive(Debug)]
pub struct RunSummary {
    /// Index of the first chapter the run was asked to save
    pub start_index: u32,

    /// Number of chapter files written
    pub chapters_written: u32,

    /// Last chapter index successfully written
    pub last_index: Option<u32>,

    /// Pages fetched, including start-location hops and the info page
    pub pages_fetched: u32,

    /// Whether the metadata file was written
    pub info_written: bool,

    /// Whether the cover image was written
    pub cover_written: bool,

    pub reason: TerminalReason,
}

impl RunSummary {
    /// Returns the fatal error, if the run failed
    pub fn error(&self) -> Option<&CrawlError> {
        match &self.reason {
            TerminalReason::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Converts a failed summary into a typed error carrying the last written index
    pub fn into_result(self) -> Result<RunSummary, NovelError> {
        match self.reason {
            TerminalReason::Failed(source) => Err(NovelError::Crawl {
                last_index: self.last_index,
                source,
            }),
            _ => Ok(self),
        }
    }
}
