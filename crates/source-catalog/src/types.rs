//! Shared types: formats, sources, refresh records and configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SourceError, SourceResult};

/// Suffix appended to content URLs and cache files for the detached signature.
pub const SIGNATURE_SUFFIX: &str = ".minisig";

/// Wire format of a catalog source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Legacy CSV table.
    V1,
    /// `## `-delimited sections with inline stamps.
    V2,
}

impl FromStr for SourceFormat {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v1" => Ok(Self::V1),
            "v2" => Ok(Self::V2),
            other => Err(SourceError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => write!(f, "v1"),
            Self::V2 => write!(f, "v2"),
        }
    }
}

/// A verified catalog source.
///
/// Only [`crate::SourceManager::acquire`] builds one, after the content
/// passed signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    url: String,
    format: SourceFormat,
    content: String,
}

impl Source {
    pub(crate) fn new(url: String, format: SourceFormat, content: String) -> Self {
        Self {
            url,
            format,
            content,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// A named catalog entry with its opaque server stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry<S> {
    /// Display name, prefix-qualified.
    pub name: String,

    /// Stamp produced by the codec.
    pub stamp: S,
}

/// A URL and its cache file, with the next time it may be refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRecord {
    /// Remote URL.
    pub url: String,

    /// Local cache file backing the URL.
    pub cache_file: PathBuf,

    /// Earliest time the next refresh is eligible.
    pub next_eligible: DateTime<Utc>,
}

impl RefreshRecord {
    pub fn new(
        url: impl Into<String>,
        cache_file: impl Into<PathBuf>,
        next_eligible: DateTime<Utc>,
    ) -> Self {
        Self {
            url: url.into(),
            cache_file: cache_file.into(),
            next_eligible,
        }
    }

    /// Whether a refresh is eligible at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_eligible <= now
    }
}

/// `now + delay`, saturating at the latest representable time.
pub(crate) fn schedule_after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delay| now.checked_add_signed(delay))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Declared catalog source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Source name; used for the default cache file name.
    pub name: String,

    /// Content URL. The signature lives at `<url>.minisig`.
    pub url: String,

    /// Minisign public key text.
    pub minisign_key: String,

    /// Cache file path (default: `<cache dir>/source-catalog/<name>.md`).
    #[serde(default)]
    pub cache_file: Option<PathBuf>,

    /// Format selector (`v1` or `v2`).
    #[serde(default = "default_format")]
    pub format: String,

    /// Prefix prepended to every entry name.
    #[serde(default)]
    pub prefix: String,

    /// Refresh delay hint in hours (advisory).
    #[serde(default = "default_refresh_delay_hours")]
    pub refresh_delay_hours: u64,
}

fn default_format() -> String {
    "v2".to_string()
}

fn default_refresh_delay_hours() -> u64 {
    72
}

impl SourceSpec {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        minisign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            minisign_key: minisign_key.into(),
            cache_file: None,
            format: default_format(),
            prefix: String::new(),
            refresh_delay_hours: default_refresh_delay_hours(),
        }
    }

    /// Set the cache file.
    pub fn with_cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_file = Some(path.into());
        self
    }

    /// Set the format selector.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Set the entry name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Refresh delay hint as a duration.
    pub fn refresh_delay(&self) -> Duration {
        Duration::from_secs(self.refresh_delay_hours.saturating_mul(3600))
    }

    /// Resolve the cache file, falling back to the platform cache directory.
    pub fn resolve_cache_file(&self) -> SourceResult<PathBuf> {
        match &self.cache_file {
            Some(path) => Ok(path.clone()),
            None => Ok(default_cache_dir()?.join(format!("{}.md", self.name))),
        }
    }
}

/// Default cache directory (`<platform cache dir>/source-catalog`).
pub fn default_cache_dir() -> SourceResult<PathBuf> {
    let base = dirs::cache_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| SourceError::Config {
            message: "could not determine cache directory".to_string(),
        })?;

    Ok(base.join("source-catalog"))
}

/// Upper bound for the freshness window and the retry delay (one year).
pub const MAX_SCHEDULE_SECS: u64 = 365 * 24 * 60 * 60;

/// Source subsystem configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// How long a cached file stays fresh, in seconds.
    #[serde(default = "default_freshness")]
    pub freshness_secs: u64,

    /// Minimum delay before a failed fetch is retried, in seconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Declared sources.
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_freshness() -> u64 {
    24 * 60 * 60
}

fn default_retry_delay() -> u64 {
    10 * 60
}

fn default_user_agent() -> String {
    concat!("source-catalog/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            freshness_secs: default_freshness(),
            retry_delay_secs: default_retry_delay(),
            user_agent: default_user_agent(),
            sources: Vec::new(),
        }
    }
}

impl SourcesConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `SOURCE_CATALOG_TIMEOUT` | Request timeout in seconds |
    /// | `SOURCE_CATALOG_MAX_RETRIES` | Retries for transient failures |
    /// | `SOURCE_CATALOG_FRESHNESS_SECS` | Cache freshness window |
    /// | `SOURCE_CATALOG_RETRY_DELAY_SECS` | Backoff floor after failed fetches |
    pub fn from_env() -> Self {
        fn env_or<T: FromStr>(key: &str, default: fn() -> T) -> T {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default)
        }

        Self {
            timeout_secs: env_or("SOURCE_CATALOG_TIMEOUT", default_timeout),
            max_retries: env_or("SOURCE_CATALOG_MAX_RETRIES", default_max_retries),
            freshness_secs: env_or("SOURCE_CATALOG_FRESHNESS_SECS", default_freshness),
            retry_delay_secs: env_or("SOURCE_CATALOG_RETRY_DELAY_SECS", default_retry_delay),
            user_agent: default_user_agent(),
            sources: Vec::new(),
        }
    }

    /// Parse a YAML configuration document.
    pub fn from_yaml_str(yaml: &str) -> SourceResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| SourceError::Config {
            message: format!("failed to parse sources config: {}", e),
        })
    }

    /// Load a YAML configuration file.
    pub fn load(path: &Path) -> SourceResult<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| SourceError::Config {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Set the request timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the retry budget for transient failures.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the freshness window.
    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness_secs = freshness.as_secs();
        self
    }

    /// Set the backoff floor for failed fetches.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_secs = delay.as_secs();
        self
    }

    /// Add a declared source.
    pub fn with_source(mut self, spec: SourceSpec) -> Self {
        self.sources.push(spec);
        self
    }

    /// Freshness window, capped at [`MAX_SCHEDULE_SECS`].
    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_secs.min(MAX_SCHEDULE_SECS))
    }

    /// Backoff floor for failed fetches, between one second and
    /// [`MAX_SCHEDULE_SECS`]. A zero delay would make failures due again at once.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs.clamp(1, MAX_SCHEDULE_SECS))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
