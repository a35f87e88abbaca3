//! Site adapters: per-site structural extraction
//!
//! A [`SiteAdapter`] knows one site's markup. Given a fetched [`Page`] it
//! extracts book metadata, a chapter, and the link to the next chapter. Adapters
//! are pure functions over page content; all fetching is done by the engine.
//!
//! New sites are supported by implementing the trait and registering the
//! adapter in an [`AdapterRegistry`]; the engine itself never changes.

mod ptwxz;
mod records;
pub mod text;
mod truyenchu;

pub use ptwxz::PtwxzAdapter;
pub use records::{ChapterRecord, InfoRecord};
pub use truyenchu::TruyenchuAdapter;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// A fetched page handed to an adapter
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL of the response, used as the base for relative links
    pub url: Url,

    /// Decoded response body
    pub body: String,
}

impl Page {
    pub fn new(url: Url, body: impl Into<String>) -> Self {
        Self {
            url,
            body: body.into(),
        }
    }
}

/// The page did not have the structure the adapter expects
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Extraction failed for {url}{}: {message}", .index.map(|i| format!(" (chapter {})", i)).unwrap_or_default())]
pub struct ExtractionError {
    pub url: String,
    pub index: Option<u32>,
    pub message: String,
}

impl ExtractionError {
    pub fn new(page: &Page, index: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            url: page.url.to_string(),
            index,
            message: message.into(),
        }
    }

    /// A required element was absent or empty
    pub fn missing(page: &Page, index: Option<u32>, what: &str) -> Self {
        Self::new(page, index, format!("missing {}", what))
    }
}

/// What kind of page a site expects as the seed URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedKind {
    /// The seed is the book's info page; the start chapter is located from it
    InfoPage,

    /// The seed is the first chapter to save
    ChapterPage,
}

/// One step of locating the start chapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartStep {
    /// The page just fetched is the start chapter
    Here,

    /// Fetch this page and ask again (chapter listings, paginated tables of content)
    Follow(Url),

    /// Fetch this page; it is the start chapter
    Chapter(Url),

    /// The book ends before the requested start chapter
    Exhausted,
}

/// Structural extraction rules for one site
///
/// `parse_chapter` must strip navigation boilerplate and collapse non-breaking
/// whitespace; it fails with an [`ExtractionError`] rather than returning empty
/// content. `next_chapter_url` returns `None` when the page's own navigation
/// marks the end of the book.
pub trait SiteAdapter: Send + Sync + fmt::Debug {
    /// Adapter name, also used in default output paths
    fn name(&self) -> &'static str;

    /// Site keys (see [`crate::url::site_key`]) this adapter handles
    fn domains(&self) -> &'static [&'static str];

    /// What the seed URL points at
    fn seed_kind(&self) -> SeedKind;

    /// Info page for a chapter-page seed, if the site has one
    fn info_url(&self, _seed: &Url) -> Option<Url> {
        None
    }

    /// Decides where the start chapter is, given the last fetched page
    fn locate_start(&self, _page: &Page, _start_index: u32) -> Result<StartStep, ExtractionError> {
        Ok(StartStep::Here)
    }

    /// Line markers of navigation text to drop from chapter content
    fn boilerplate(&self) -> &'static [&'static str] {
        &[]
    }

    fn parse_info(&self, page: &Page) -> Result<InfoRecord, ExtractionError>;

    fn parse_chapter(&self, page: &Page, index: u32) -> Result<ChapterRecord, ExtractionError>;

    fn next_chapter_url(&self, page: &Page) -> Option<Url>;
}

/// Maps site keys to adapters
#[derive(Debug, Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn SiteAdapter>>,
}

impl AdapterRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in adapter
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TruyenchuAdapter));
        registry.register(Arc::new(PtwxzAdapter));
        registry
    }

    /// Registers an adapter under each of its site keys, replacing earlier entries
    pub fn register(&mut self, adapter: Arc<dyn SiteAdapter>) {
        for domain in adapter.domains() {
            self.adapters
                .insert(domain.to_lowercase(), Arc::clone(&adapter));
        }
    }

    /// Looks up the adapter for a site key
    pub fn get(&self, key: &str) -> Option<Arc<dyn SiteAdapter>> {
        self.adapters.get(&key.to_lowercase()).cloned()
    }

    /// Registered site keys, sorted
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}
