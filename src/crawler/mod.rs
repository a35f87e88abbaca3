//! Crawler module: fetching, traversal and orchestration
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic and politeness delay
//! - The sequential fetch → extract → persist → decide engine
//! - Overall run coordination (adapter choice, output directory, cleanup)

mod coordinator;
mod engine;
mod fetcher;

pub use coordinator::{CrawlOrchestrator, RunReport, LOCK_FILE};
pub use engine::TraversalEngine;
pub use fetcher::{
    build_http_client, continuity_headers, FetchError, FetchErrorKind, FetchedPage, Fetcher,
    Headers, HttpFetcher, REFERER,
};
