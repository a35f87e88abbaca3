use crate::state::StopIndex;
use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Novel-Trail
///
/// Every section is optional in the TOML file; missing sections fall back to
/// their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Minimum time between two requests (milliseconds)
    #[serde(rename = "request-delay-ms")]
    pub request_delay_ms: u64,

    /// Retries for transient failures (5xx, 429, timeouts, refused connections)
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Delay between retries (milliseconds)
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    /// Whole-request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Upper bound on pages visited while locating the start chapter
    #[serde(rename = "max-start-hops")]
    pub max_start_hops: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 200,
            max_retries: 3,
            retry_delay_ms: 1000,
            timeout_secs: 30,
            max_start_hops: 8,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "NovelTrail".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: None,
        }
    }
}

impl UserAgentConfig {
    /// Formats the user agent header value
    ///
    /// Format: `CrawlerName/Version` or `CrawlerName/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(contact) => format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, contact
            ),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory under which default output locations are created
    pub root: PathBuf,

    /// File extension for chapter and metadata files
    pub extension: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            extension: "txt".to_string(),
        }
    }
}

/// Parameters of a single run, supplied by the caller rather than the config file
#[derive(Debug, Clone)]
pub struct RunParams {
    /// First page of the run (info page or first chapter, depending on the site)
    pub seed_url: String,

    /// Index given to the first saved chapter
    pub start_index: u32,

    /// Last index to save
    pub stop_index: StopIndex,

    /// Output directory; derived from the output root when absent
    pub output_dir: Option<PathBuf>,

    /// Clear the output directory before the run
    pub reset: bool,

    /// Run the post-crawl cleanup pass
    pub clean: bool,

    /// Fetch the info page and cover image
    pub with_info: bool,
}

impl RunParams {
    /// Creates parameters for an unbounded run starting at chapter 1
    pub fn new(seed_url: impl Into<String>) -> Self {
        Self {
            seed_url: seed_url.into(),
            start_index: 1,
            stop_index: StopIndex::Unbounded,
            output_dir: None,
            reset: false,
            clean: false,
            with_info: true,
        }
    }
}
