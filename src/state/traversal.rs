use crate::state::Phase;
use std::fmt;
use url::Url;

/// Last chapter index to save in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopIndex {
    /// Continue until the site signals the end of the book
    Unbounded,

    /// Stop after saving this index
    At(u32),
}

impl StopIndex {
    /// Builds a stop index from its command-line form
    ///
    /// Any value below 1 (conventionally `-1`) means unbounded.
    pub fn from_signed(value: i64) -> Self {
        if value < 1 {
            Self::Unbounded
        } else {
            Self::At(u32::try_from(value).unwrap_or(u32::MAX))
        }
    }

    /// Applies the run's start index
    ///
    /// A stop index below the start index cannot be reached, so the run is
    /// treated as unbounded and crawls until the natural end of the book.
    pub fn normalized(self, start_index: u32) -> Self {
        match self {
            Self::At(stop) if stop < start_index => Self::Unbounded,
            other => other,
        }
    }

    /// Returns true if `index` is the last index to save
    pub fn is_reached(&self, index: u32) -> bool {
        matches!(self, Self::At(stop) if index >= *stop)
    }
}

impl fmt::Display for StopIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => write!(f, "unbounded"),
            Self::At(stop) => write!(f, "{}", stop),
        }
    }
}

/// Mutable bookkeeping of one traversal, owned by the engine for the run
#[derive(Debug, Clone)]
pub struct TraversalState {
    /// Page about to be (or just) fetched
    pub current_url: Url,

    /// Index the current page's chapter will be saved under
    pub current_index: u32,

    /// Previously fetched page, sent as the continuity header
    pub previous_url: Option<Url>,

    /// Last index to save
    pub stop_index: StopIndex,

    /// Pages fetched so far, including start-location hops
    pub visited_count: u32,

    /// Last index successfully persisted
    pub last_written: Option<u32>,

    /// Current engine phase
    pub phase: Phase,
}

impl TraversalState {
    /// Creates the state for a run beginning at `seed`
    pub fn new(seed: Url, start_index: u32, stop_index: StopIndex) -> Self {
        Self {
            current_url: seed,
            current_index: start_index,
            previous_url: None,
            stop_index: stop_index.normalized(start_index),
            visited_count: 0,
            last_written: None,
            phase: Phase::Init,
        }
    }

    /// Records a transition, returning false if it is not legal
    pub fn enter(&mut self, next: Phase) -> bool {
        if !self.phase.can_transition_to(next) {
            tracing::warn!("Illegal phase transition {} -> {}", self.phase, next);
            return false;
        }
        tracing::trace!(
            index = self.current_index,
            "Phase {} -> {}",
            self.phase,
            next
        );
        self.phase = next;
        true
    }

    /// Moves to another page without changing the chapter index
    pub fn follow(&mut self, next: Url) {
        let previous = std::mem::replace(&mut self.current_url, next);
        self.previous_url = Some(previous);
    }

    /// Moves to the next chapter page and bumps the index by one
    pub fn advance(&mut self, next: Url) {
        self.follow(next);
        self.current_index += 1;
    }

    /// Records that the current index reached the output sink
    pub fn mark_written(&mut self) {
        self.last_written = Some(self.current_index);
    }

    /// Continuity header value for the next request
    pub fn referer(&self) -> Option<&str> {
        self.previous_url.as_ref().map(Url::as_str)
    }
}
