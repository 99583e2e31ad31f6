//! Cache-first fetcher for source URLs.
//!
//! Public API: no status code knowledge. All HTTP/status mapping in http.rs.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, info, warn};

use crate::cache;
use crate::error::{SourceError, SourceResult};
use crate::types::SourcesConfig;

mod http;

use http::HttpBackend;

/// Result of [`Fetcher::fetch_with_cache`].
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Payload bytes.
    pub content: Vec<u8>,

    /// Whether the payload came from the cache file.
    pub from_cache: bool,

    /// Delay until the next refresh of this URL becomes eligible.
    pub next_delay: Duration,
}

/// Fetches source URLs, preferring an existing cache file.
#[derive(Debug, Clone)]
pub struct Fetcher {
    http: HttpBackend,
    freshness: Duration,
    retry_delay: Duration,
}

impl Fetcher {
    pub fn new(config: &SourcesConfig) -> SourceResult<Self> {
        let mut default_headers = HeaderMap::new();
        let user_agent =
            HeaderValue::from_str(&config.user_agent).map_err(|e| SourceError::Config {
                message: format!("invalid user agent: {}", e),
            })?;
        default_headers.insert(USER_AGENT, user_agent);

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(default_headers)
            .build()
            .map_err(|e| SourceError::Config {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http: HttpBackend {
                client,
                max_retries: config.max_retries,
            },
            freshness: config.freshness(),
            retry_delay: config.retry_delay(),
        })
    }

    pub fn from_env() -> SourceResult<Self> {
        Self::new(&SourcesConfig::from_env())
    }

    /// Freshness window applied to cache files.
    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    /// Backoff floor scheduled after a failed fetch.
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Return the cached copy of `url` if one exists, otherwise download it.
    ///
    /// A cached copy is served whatever its age; staleness only shortens
    /// `next_delay`, down to zero. A download reports the full freshness
    /// window. Nothing is written to disk here.
    pub async fn fetch_with_cache(
        &self,
        url: &str,
        cache_file: &Path,
    ) -> SourceResult<FetchOutcome> {
        match cache::read_if_present(cache_file).await {
            Ok(Some(cached)) => {
                let next_delay = cached.delay_until_stale(self.freshness, Utc::now());
                if next_delay.is_zero() {
                    debug!(cache_file = %cache_file.display(), "cache file needs to be refreshed");
                } else {
                    debug!(
                        cache_file = %cache_file.display(),
                        next_delay_secs = next_delay.as_secs(),
                        "cache file is still fresh"
                    );
                }
                return Ok(FetchOutcome {
                    content: cached.content,
                    from_cache: true,
                    next_delay,
                });
            }
            Ok(None) => {}
            Err(e) => {
                warn!(
                    cache_file = %cache_file.display(),
                    error = %e,
                    "ignoring unreadable cache file"
                );
            }
        }

        info!(url, "loading source information from URL");
        let content = self.http.get(url).await?;

        Ok(FetchOutcome {
            content,
            from_cache: false,
            next_delay: self.freshness,
        })
    }
}
