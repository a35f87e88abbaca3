//! Crawl orchestration
//!
//! This module wires one run together:
//! - Picking the site adapter from the seed URL's domain
//! - Reserving and preparing the output directory
//! - Running the traversal engine
//! - Optional cleanup of the written files

use crate::config::{validate_run_params, Config, RunParams};
use crate::crawler::engine::TraversalEngine;
use crate::crawler::fetcher::{Fetcher, HttpFetcher};
use crate::output::{CleanupReport, DirectorySink, LineCleaner, PostProcessor};
use crate::site::{AdapterRegistry, SiteAdapter};
use crate::state::RunSummary;
use crate::url::{parse_seed_url, site_key};
use crate::{NovelError, UrlError};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Result of an orchestrated run
#[derive(Debug)]
pub struct RunReport {
    /// Directory the files were written to
    pub output_dir: PathBuf,

    pub summary: RunSummary,

    /// Set when a cleanup pass ran
    pub cleanup: Option<CleanupReport>,
}

/// Marks an output directory as owned by a running crawl
pub const LOCK_FILE: &str = ".novel-trail.lock";

/// Exclusive claim on an output directory, released on drop
///
/// Backed by a lock file created with `create_new`, so runs in other
/// processes are refused too.
#[derive(Debug)]
struct OutputLease {
    lock_path: PathBuf,
}

impl Drop for OutputLease {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock_path) {
            tracing::warn!("Could not remove {}: {}", self.lock_path.display(), e);
        }
    }
}

/// Main orchestration structure
pub struct CrawlOrchestrator {
    config: Arc<Config>,
    registry: AdapterRegistry,
    fetcher: Arc<dyn Fetcher>,
    post_processor: Arc<dyn PostProcessor>,
}

impl CrawlOrchestrator {
    /// Creates an orchestrator with the built-in adapters and an HTTP fetcher
    ///
    /// # Arguments
    ///
    /// * `config` - The validated crawler configuration
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlOrchestrator)` - Ready to run
    /// * `Err(NovelError)` - The HTTP client could not be built
    pub fn new(config: Config) -> Result<Self, NovelError> {
        let fetcher = HttpFetcher::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            registry: AdapterRegistry::with_defaults(),
            fetcher: Arc::new(fetcher),
            post_processor: Arc::new(LineCleaner::new()),
        })
    }

    /// Replaces the network layer
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Replaces the adapter registry
    pub fn with_registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replaces the cleanup pass run for `clean` runs
    pub fn with_post_processor(mut self, post_processor: Arc<dyn PostProcessor>) -> Self {
        self.post_processor = post_processor;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Maps the seed URL's site key to a registered adapter
    pub fn resolve_adapter(&self, seed_url: &str) -> Result<Arc<dyn SiteAdapter>, NovelError> {
        let url = parse_seed_url(seed_url)?;
        let domain = site_key(&url).ok_or(UrlError::MissingDomain)?;

        self.registry
            .get(&domain)
            .ok_or_else(|| NovelError::UnsupportedSite {
                url: url.to_string(),
                domain,
            })
    }

    /// `<root>/<adapter>/<YYYY_MM_DD-HH_MM_SS>/raw`
    pub fn default_output_dir(&self, adapter: &dyn SiteAdapter) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y_%m_%d-%H_%M_%S").to_string();
        self.config
            .output
            .root
            .join(adapter.name())
            .join(stamp)
            .join("raw")
    }

    /// Creates the output directory, clearing it first when `reset` is set
    ///
    /// Clearing keeps the run's lock file. The directory exists afterwards
    /// even if clearing failed part way. Returns the canonical path.
    pub fn prepare_output_location(path: &Path, reset: bool) -> Result<PathBuf, NovelError> {
        fs::create_dir_all(path)?;
        if reset {
            tracing::info!("Clearing {}", path.display());
            for entry in fs::read_dir(path)? {
                let entry = entry?;
                if entry.file_name() == LOCK_FILE {
                    continue;
                }
                if entry.file_type()?.is_dir() {
                    fs::remove_dir_all(entry.path())?;
                } else {
                    fs::remove_file(entry.path())?;
                }
            }
        }
        Ok(path.canonicalize()?)
    }

    /// Claims the existing directory at `path` for one run
    fn acquire(path: &Path) -> Result<OutputLease, NovelError> {
        let lock_path = path.join(LOCK_FILE);
        let mut lock = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(NovelError::OutputBusy {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let lease = OutputLease { lock_path };
        writeln!(lock, "{}", std::process::id())?;
        Ok(lease)
    }

    /// Runs one crawl
    ///
    /// # Arguments
    ///
    /// * `params` - Seed URL, index range and output options
    /// * `cancel` - Signal observed by the engine between pages
    ///
    /// # Returns
    ///
    /// * `Ok(RunReport)` - The run reached a terminal state, including `FAILED`
    /// * `Err(NovelError)` - The run could not start
    pub async fn run(
        &self,
        params: &RunParams,
        cancel: CancellationToken,
    ) -> Result<RunReport, NovelError> {
        validate_run_params(params)?;
        let adapter = self.resolve_adapter(&params.seed_url)?;

        let requested = params
            .output_dir
            .clone()
            .unwrap_or_else(|| self.default_output_dir(adapter.as_ref()));
        fs::create_dir_all(&requested)?;
        let _lease = Self::acquire(&requested)?;
        let output_dir = Self::prepare_output_location(&requested, params.reset)?;
        tracing::info!(adapter = adapter.name(), "Writing to {}", output_dir.display());

        let sink = Arc::new(DirectorySink::new(
            &output_dir,
            self.config.output.extension.as_str(),
        ));
        let engine = TraversalEngine::new(adapter, Arc::clone(&self.fetcher), sink)
            .with_cancellation(cancel)
            .with_config(&self.config.crawler);
        let summary = engine.run(params).await?;

        let cleanup = if params.clean && !summary.reason.is_failed() {
            match self
                .post_processor
                .process(&output_dir, &self.config.output.extension)
            {
                Ok(report) => Some(report),
                Err(e) => {
                    tracing::warn!("{} failed: {}", self.post_processor.name(), e);
                    None
                }
            }
        } else {
            None
        };

        tracing::info!("Done. View result at: {}", output_dir.display());
        Ok(RunReport {
            output_dir,
            summary,
            cleanup,
        })
    }
}
