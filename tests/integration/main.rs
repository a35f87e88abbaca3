//! Integration tests for Novel-Trail
//!
//! Engine properties are checked against an in-memory scripted fetcher; the
//! HTTP layer and full orchestrated runs use wiremock servers.

mod crawl_tests;
mod engine_tests;
