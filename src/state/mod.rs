//! State module for tracking traversal progress
//!
//! # Components
//!
//! - `Phase`: the engine's per-page state machine (fetching, extracting, persisting, deciding)
//! - `TraversalState`: current URL, index, continuity referer and stop index of one run
//! - `TerminalReason` / `RunSummary`: how a run ended and what it wrote

mod phase;
mod terminal;
mod traversal;

// Re-export main types
pub use phase::Phase;
pub use terminal::{RunSummary, StopCause, TerminalReason};
pub use traversal::{StopIndex, TraversalState};
