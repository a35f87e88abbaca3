/// Engine phase definitions for tracking traversal progress
///
/// This module defines the states the traversal engine moves through for each page.
use std::fmt;

/// Represents the current phase of the traversal engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    // ===== Setup =====
    /// Run parameters are being validated
    Init,

    // ===== Per-page cycle =====
    /// A page request is in flight
    Fetching,

    /// The adapter is extracting a chapter from the fetched page
    Extracting,

    /// The chapter is being handed to the output sink
    Persisting,

    /// Termination is being decided for the persisted chapter
    Deciding,

    // ===== Terminal =====
    /// The run stopped normally (end of book, stop index, or cancellation)
    Done,

    /// The run stopped on a fatal error
    Failed,
}

impl Phase {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if `next` is a legal successor of this phase
    ///
    /// Any non-terminal phase may fail; the cycle otherwise runs
    /// `Fetching → Extracting → Persisting → Deciding → (Fetching | Done)`.
    pub fn can_transition_to(&self, next: Phase) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == Self::Failed {
            return true;
        }
        matches!(
            (self, next),
            (Self::Init, Self::Fetching)
                | (Self::Init, Self::Done)
                | (Self::Fetching, Self::Fetching)
                | (Self::Fetching, Self::Extracting)
                | (Self::Fetching, Self::Done)
                | (Self::Extracting, Self::Persisting)
                | (Self::Persisting, Self::Deciding)
                | (Self::Deciding, Self::Fetching)
                | (Self::Deciding, Self::Done)
        )
    }

    /// Short lowercase name used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Persisting => "persisting",
            Self::Deciding => "deciding",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
