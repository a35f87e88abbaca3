//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the engine, including:
//! - Building HTTP clients with proper user agent strings
//! - Spacing requests by the configured politeness delay
//! - Retry logic for transient failures
//! - Error classification
//!
//! The engine only sees the [`Fetcher`] trait; [`HttpFetcher`] is the reqwest
//! implementation used by the binary.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, Response, StatusCode};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

/// Request headers supplied by the engine
pub type Headers = BTreeMap<String, String>;

/// Continuity header naming the previously fetched page
pub const REFERER: &str = "Referer";

/// Builds the header map for a request following `previous`
///
/// The first request of a run has no previous page and carries no header.
pub fn continuity_headers(previous: Option<&str>) -> Headers {
    let mut headers = Headers::new();
    if let Some(previous) = previous {
        headers.insert(REFERER.to_string(), previous.to_string());
    }
    headers
}

/// How a fetch failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Non-success HTTP status
    Status(u16),

    /// Request timed out
    Timeout,

    /// Connection could not be established
    Connect,

    /// Any other transport failure
    Transport(String),

    /// Response body could not be read or decoded
    Body(String),
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::Timeout => write!(f, "request timeout"),
            Self::Connect => write!(f, "connection failed"),
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::Body(e) => write!(f, "unreadable body: {}", e),
        }
    }
}

/// A fetch failed after the fetcher's own retry policy was exhausted
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Fetch failed for {url}: {kind}")]
pub struct FetchError {
    pub url: String,
    pub kind: FetchErrorKind,
}

impl FetchError {
    pub fn new(url: &Url, kind: FetchErrorKind) -> Self {
        Self {
            url: url.to_string(),
            kind,
        }
    }

    /// Returns true for failures worth retrying
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 5xx | Retry |
    /// | HTTP 429 | Retry |
    /// | Timeout | Retry |
    /// | Connection failure | Retry |
    /// | Other 4xx, body errors | Immediate failure |
    pub fn is_transient(&self) -> bool {
        match self.kind {
            FetchErrorKind::Status(code) => {
                code == StatusCode::TOO_MANY_REQUESTS.as_u16() || (500..600).contains(&code)
            }
            FetchErrorKind::Timeout | FetchErrorKind::Connect => true,
            FetchErrorKind::Transport(_) | FetchErrorKind::Body(_) => false,
        }
    }

    fn from_reqwest(url: &Url, error: &reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            FetchErrorKind::Timeout
        } else if error.is_connect() {
            FetchErrorKind::Connect
        } else {
            FetchErrorKind::Transport(error.to_string())
        };
        Self::new(url, kind)
    }
}

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// HTTP status code
    pub status: u16,

    /// URL of the response after redirects
    pub final_url: Url,

    /// Decoded body
    pub body: String,
}

/// Network capability used by the traversal engine
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches a page and decodes its body as text
    async fn fetch(&self, url: &Url, headers: &Headers) -> Result<FetchedPage, FetchError>;

    /// Fetches a binary resource such as a cover image
    async fn fetch_bytes(&self, url: &Url, headers: &Headers) -> Result<Vec<u8>, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    let timeout = Duration::from_secs(config.crawler.timeout_secs);

    Client::builder()
        .user_agent(config.user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed [`Fetcher`]
///
/// Clones share the client and the politeness clock, so requests from the
/// chapter loop and the cover task are spaced against each other.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    request_delay: Duration,
    max_retries: u32,
    retry_delay: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl HttpFetcher {
    /// Creates a fetcher from the crawler configuration
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            request_delay: Duration::from_millis(config.crawler.request_delay_ms),
            max_retries: config.crawler.max_retries,
            retry_delay: Duration::from_millis(config.crawler.retry_delay_ms),
            last_request: Arc::new(Mutex::new(None)),
        })
    }

    /// Waits until the politeness delay since the previous request has elapsed
    async fn wait_turn(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.request_delay {
                tokio::time::sleep(self.request_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn send_once(&self, url: &Url, headers: &Headers) -> Result<Response, FetchError> {
        let mut request = self.client.get(url.clone());
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(url, FetchErrorKind::Status(status.as_u16())));
        }
        Ok(response)
    }

    /// Sends a GET request, retrying transient failures
    async fn send(&self, url: &Url, headers: &Headers) -> Result<Response, FetchError> {
        let mut attempt = 0;
        loop {
            self.wait_turn().await;
            tracing::debug!(attempt, "GET {}", url);

            match self.send_once(url, headers).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        "{} (retry {}/{} in {:?})",
                        e,
                        attempt,
                        self.max_retries,
                        self.retry_delay
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, headers: &Headers) -> Result<FetchedPage, FetchError> {
        let response = self.send(url, headers).await?;
        let status = response.status().as_u16();
        let final_url = response.url().clone();

        // Decodes using the charset from Content-Type, falling back to UTF-8
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::new(url, FetchErrorKind::Body(e.to_string())))?;

        Ok(FetchedPage {
            status,
            final_url,
            body,
        })
    }

    async fn fetch_bytes(&self, url: &Url, headers: &Headers) -> Result<Vec<u8>, FetchError> {
        let response = self.send(url, headers).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::new(url, FetchErrorKind::Body(e.to_string())))?;
        Ok(bytes.to_vec())
    }
}
