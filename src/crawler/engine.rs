//! Sequential traversal engine
//!
//! One run walks a book page by page:
//!
//! ```text
//! INIT -> FETCHING -> EXTRACTING -> PERSISTING -> DECIDING -> FETCHING | DONE
//!                                                (any step) -> FAILED
//! ```
//!
//! Chapter N+1 is never fetched before chapter N is on disk, and every request
//! after the first carries a `Referer` naming the page fetched before it.
//! Cancellation is observed between pages; a fetch already in flight finishes.

use crate::config::{validate_run_params, CrawlerConfig, RunParams};
use crate::crawler::fetcher::{continuity_headers, Fetcher};
use crate::output::OutputSink;
use crate::site::{ExtractionError, Page, SeedKind, SiteAdapter, StartStep};
use crate::state::{Phase, RunSummary, StopCause, TerminalReason, TraversalState};
use crate::url::parse_seed_url;
use crate::{CrawlError, NovelError};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// Drives one traversal with a fixed adapter, fetcher and sink
pub struct TraversalEngine {
    adapter: Arc<dyn SiteAdapter>,
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn OutputSink>,
    cancel: CancellationToken,
    max_start_hops: u32,
}

/// Bookkeeping of a run in progress
struct Run {
    state: TraversalState,
    pages_fetched: u32,
    chapters_written: u32,
    info_written: bool,
    cover_task: Option<JoinHandle<bool>>,
}

impl TraversalEngine {
    pub fn new(
        adapter: Arc<dyn SiteAdapter>,
        fetcher: Arc<dyn Fetcher>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            adapter,
            fetcher,
            sink,
            cancel: CancellationToken::new(),
            max_start_hops: CrawlerConfig::default().max_start_hops,
        }
    }

    /// Uses `token` as the external cancellation signal
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Applies the crawler settings the engine itself uses
    pub fn with_config(mut self, config: &CrawlerConfig) -> Self {
        self.max_start_hops = config.max_start_hops;
        self
    }

    /// Runs a traversal to completion
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - The run reached a terminal state. A summary whose
    ///   reason is `Failed` still describes the files written before the error;
    ///   use [`RunSummary::into_result`] to turn it into an error.
    /// * `Err(NovelError)` - The run parameters were rejected before any I/O
    pub async fn run(&self, params: &RunParams) -> Result<RunSummary, NovelError> {
        validate_run_params(params)?;
        let seed = parse_seed_url(&params.seed_url)?;

        info!(
            adapter = self.adapter.name(),
            start = params.start_index,
            stop = %params.stop_index,
            "Starting traversal at {}",
            seed
        );

        let mut run = Run {
            state: TraversalState::new(seed.clone(), params.start_index, params.stop_index),
            pages_fetched: 0,
            chapters_written: 0,
            info_written: false,
            cover_task: None,
        };

        let reason = match self.traverse(&mut run, &seed, params).await {
            Ok(reason) => reason,
            Err(e) => TerminalReason::Failed(e),
        };

        let cover_written = match run.cover_task.take() {
            Some(task) => task.await.unwrap_or_else(|e| {
                warn!("Cover task did not finish: {}", e);
                false
            }),
            None => false,
        };

        match &reason {
            TerminalReason::Failed(e) => {
                run.state.enter(Phase::Failed);
                error!(
                    last_index = ?run.state.last_written,
                    "Traversal failed at {}: {}",
                    run.state.current_url,
                    e
                );
            }
            other => {
                run.state.enter(Phase::Done);
                info!(
                    chapters = run.chapters_written,
                    last_index = ?run.state.last_written,
                    "Traversal finished: {}",
                    other
                );
            }
        }

        Ok(RunSummary {
            start_index: params.start_index,
            chapters_written: run.chapters_written,
            last_index: run.state.last_written,
            pages_fetched: run.pages_fetched,
            info_written: run.info_written,
            cover_written,
            reason,
        })
    }

    async fn traverse(
        &self,
        run: &mut Run,
        seed: &Url,
        params: &RunParams,
    ) -> Result<TerminalReason, CrawlError> {
        let seed_kind = self.adapter.seed_kind();

        let Some(seed_page) = self.fetch_current(run).await? else {
            return Ok(TerminalReason::Cancelled);
        };

        if seed_kind == SeedKind::InfoPage && params.with_info {
            self.save_info(run, &seed_page);
        }

        let Some(mut page) = self.locate_start(run, seed_page).await? else {
            return Ok(TerminalReason::Cancelled);
        };

        let mut info_pending = seed_kind == SeedKind::ChapterPage && params.with_info;

        loop {
            let index = run.state.current_index;

            run.state.enter(Phase::Extracting);
            let record = self.adapter.parse_chapter(&page, index)?;
            debug!("Extracted {}", record);

            run.state.enter(Phase::Persisting);
            self.sink.write_chapter(&record)?;
            run.state.mark_written();
            run.chapters_written += 1;
            info!(index, url = %run.state.current_url, "Saved chapter: {}", record.title);

            if info_pending {
                info_pending = false;
                if let Some(info_url) = self.adapter.info_url(seed) {
                    self.fetch_info(run, info_url).await;
                }
            }

            run.state.enter(Phase::Deciding);
            if self.cancel.is_cancelled() {
                info!(index, "Cancellation observed");
                return Ok(TerminalReason::Cancelled);
            }
            if run.state.stop_index.is_reached(index) {
                return Ok(TerminalReason::Done(StopCause::StopIndexReached));
            }
            let Some(next) = self.adapter.next_chapter_url(&page) else {
                return Ok(TerminalReason::Done(StopCause::EndOfBook));
            };
            if next == run.state.current_url || next == page.url {
                return Err(ExtractionError::new(
                    &page,
                    Some(index),
                    "next chapter link points back at the current page",
                )
                .into());
            }

            run.state.advance(next);
            match self.fetch_current(run).await? {
                Some(next_page) => page = next_page,
                None => return Ok(TerminalReason::Cancelled),
            }
        }
    }

    /// Fetches `state.current_url`, or returns `None` if cancellation was signaled
    async fn fetch_current(&self, run: &mut Run) -> Result<Option<Page>, CrawlError> {
        if self.cancel.is_cancelled() {
            return Ok(None);
        }

        run.state.enter(Phase::Fetching);
        let headers = continuity_headers(run.state.referer());
        debug!(
            index = run.state.current_index,
            referer = ?run.state.referer(),
            "Fetching {}",
            run.state.current_url
        );

        let fetched = self.fetcher.fetch(&run.state.current_url, &headers).await?;
        run.pages_fetched += 1;
        run.state.visited_count += 1;
        Ok(Some(Page::new(fetched.final_url, fetched.body)))
    }

    /// Follows the adapter from the seed page to the start chapter
    async fn locate_start(&self, run: &mut Run, mut page: Page) -> Result<Option<Page>, CrawlError> {
        let start_index = run.state.current_index;
        let mut hops = 0;

        loop {
            let next = match self.adapter.locate_start(&page, start_index)? {
                StartStep::Here => return Ok(Some(page)),
                StartStep::Exhausted => {
                    return Err(CrawlError::NavigationExhausted {
                        url: page.url.to_string(),
                        start_index,
                    })
                }
                StartStep::Follow(url) => (url, false),
                StartStep::Chapter(url) => (url, true),
            };

            if hops >= self.max_start_hops {
                return Err(ExtractionError::new(
                    &page,
                    Some(start_index),
                    format!("start chapter not located within {} pages", self.max_start_hops),
                )
                .into());
            }
            hops += 1;

            let (url, is_chapter) = next;
            debug!(hop = hops, "Locating chapter {} via {}", start_index, url);
            run.state.follow(url);
            page = match self.fetch_current(run).await? {
                Some(p) => p,
                None => return Ok(None),
            };
            if is_chapter {
                return Ok(Some(page));
            }
        }
    }

    /// Fetches an info page outside the chapter sequence
    ///
    /// Failures are logged and leave `info_written` unset.
    async fn fetch_info(&self, run: &mut Run, info_url: Url) {
        if self.cancel.is_cancelled() {
            return;
        }

        let headers = continuity_headers(Some(run.state.current_url.as_str()));
        match self.fetcher.fetch(&info_url, &headers).await {
            Ok(fetched) => {
                run.pages_fetched += 1;
                let page = Page::new(fetched.final_url, fetched.body);
                self.save_info(run, &page);
            }
            Err(e) => warn!("Skipping book info: {}", e),
        }
    }

    /// Extracts and writes the info record, then starts the cover download
    fn save_info(&self, run: &mut Run, page: &Page) {
        let info = match self.adapter.parse_info(page) {
            Ok(info) => info,
            Err(e) => {
                warn!("Skipping book info: {}", e);
                return;
            }
        };

        debug!("Book info\n{}", info);
        match self.sink.write_info(&info) {
            Ok(()) => {
                run.info_written = true;
                info!("Saved book info: {} by {}", info.title, info.author);
            }
            Err(e) => warn!("Skipping book info: {}", e),
        }

        if let Some(cover) = info.cover_image_url.as_deref() {
            match Url::parse(cover) {
                Ok(cover_url) => run.cover_task = Some(self.spawn_cover(cover_url, page.url.clone())),
                Err(e) => warn!("Skipping cover {}: {}", cover, e),
            }
        }
    }

    /// Downloads the cover concurrently with the chapter loop
    fn spawn_cover(&self, cover_url: Url, referer: Url) -> JoinHandle<bool> {
        let fetcher = Arc::clone(&self.fetcher);
        let sink = Arc::clone(&self.sink);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            if cancel.is_cancelled() {
                return false;
            }
            let headers = continuity_headers(Some(referer.as_str()));
            let bytes = match fetcher.fetch_bytes(&cover_url, &headers).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Skipping cover: {}", e);
                    return false;
                }
            };
            match sink.write_cover(&bytes) {
                Ok(()) => {
                    debug!("Saved cover from {}", cover_url);
                    true
                }
                Err(e) => {
                    warn!("Skipping cover: {}", e);
                    false
                }
            }
        })
    }
}
