//! Source acquisition.
//!
//! Acquiring a source:
//! 1. Validate the format selector and public key (no I/O on failure)
//! 2. Fetch `<url>` and `<url>.minisig`, each cache-first
//! 3. Schedule a refresh record for both URLs, whatever happens next
//! 4. Verify the signature; on any trust failure delete both cache files
//! 5. Persist whichever half was downloaded
//!
//! Content is only ever written to the cache after it verified in the same
//! call, so the cache holds either a verified pair or nothing.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::cache;
use crate::client::{FetchOutcome, Fetcher};
use crate::error::{SourceError, SourceResult};
use crate::stamp::StampCodec;
use crate::trust::{verify_detached, PublicKey};
use crate::types::{
    schedule_after, CatalogEntry, RefreshRecord, Source, SourceFormat, SourceSpec,
    SourcesConfig, SIGNATURE_SUFFIX,
};

/// Outcome of [`SourceManager::acquire`].
///
/// `refresh` is populated as soon as fetching was attempted, including when
/// `result` is an error, so callers can keep scheduling both URLs.
#[derive(Debug)]
pub struct Acquisition {
    /// Verified source, or the first error encountered.
    pub result: SourceResult<Source>,

    /// Refresh records for the content URL and the signature URL.
    pub refresh: Vec<RefreshRecord>,
}

impl Acquisition {
    fn rejected(err: SourceError) -> Self {
        Self {
            result: Err(err),
            refresh: Vec::new(),
        }
    }
}

/// Entries and bookkeeping collected by [`SourceManager::load_all`].
#[derive(Debug)]
pub struct LoadReport<S> {
    /// Entries of every source that loaded and parsed.
    pub entries: Vec<CatalogEntry<S>>,

    /// Per-source failures, keyed by source name.
    pub failures: Vec<(String, SourceError)>,

    /// Refresh records of every source, including failed ones.
    pub refresh: Vec<RefreshRecord>,
}

/// Orchestrates fetching, verification and caching of catalog sources.
#[derive(Debug, Clone)]
pub struct SourceManager {
    fetcher: Fetcher,
    config: SourcesConfig,
}

impl SourceManager {
    pub fn new(config: SourcesConfig) -> SourceResult<Self> {
        let fetcher = Fetcher::new(&config)?;
        Ok(Self { fetcher, config })
    }

    pub fn from_env() -> SourceResult<Self> {
        Self::new(SourcesConfig::from_env())
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn config(&self) -> &SourcesConfig {
        &self.config
    }

    /// Fetch, verify and cache the source at `url`.
    ///
    /// `refresh_delay` is accepted for configuration compatibility but does
    /// not influence scheduling; the freshness window does.
    pub async fn acquire(
        &self,
        url: &str,
        minisign_key: &str,
        cache_file: &Path,
        format: &str,
        refresh_delay: Duration,
    ) -> Acquisition {
        let format: SourceFormat = match format.parse() {
            Ok(f) => f,
            Err(e) => return Acquisition::rejected(e),
        };
        let key = match PublicKey::decode(minisign_key) {
            Ok(k) => k,
            Err(e) => return Acquisition::rejected(e),
        };
        debug!(
            url,
            format = %format,
            key_id = %key.key_id(),
            refresh_delay_secs = refresh_delay.as_secs(),
            "acquiring source"
        );

        let now = Utc::now();
        let sig_url = format!("{}{}", url, SIGNATURE_SUFFIX);
        let sig_cache_file = cache::signature_path(cache_file);

        let content = self.fetcher.fetch_with_cache(url, cache_file).await;
        let signature = self.fetcher.fetch_with_cache(&sig_url, &sig_cache_file).await;

        let refresh = vec![
            RefreshRecord::new(url, cache_file, self.schedule(now, &content)),
            RefreshRecord::new(sig_url, &sig_cache_file, self.schedule(now, &signature)),
        ];

        let result = match (content, signature) {
            (Ok(content), Ok(signature)) => {
                self.verify_and_persist(url, format, &key, cache_file, content, signature)
                    .await
            }
            (Err(e), _) | (_, Err(e)) => Err(e),
        };

        Acquisition { result, refresh }
    }

    /// Acquire a declared source, resolving its defaults.
    pub async fn acquire_spec(&self, spec: &SourceSpec) -> Acquisition {
        let cache_file = match spec.resolve_cache_file() {
            Ok(path) => path,
            Err(e) => return Acquisition::rejected(e),
        };
        self.acquire(
            &spec.url,
            &spec.minisign_key,
            &cache_file,
            &spec.format,
            spec.refresh_delay(),
        )
        .await
    }

    /// Acquire and parse every declared source.
    ///
    /// A failing source is reported and skipped; the others still load.
    pub async fn load_all<C: StampCodec>(&self, codec: &C) -> LoadReport<C::Stamp> {
        let mut report = LoadReport {
            entries: Vec::new(),
            failures: Vec::new(),
            refresh: Vec::new(),
        };

        for spec in &self.config.sources {
            let acquisition = self.acquire_spec(spec).await;
            report.refresh.extend(acquisition.refresh);

            let parsed = acquisition
                .result
                .and_then(|source| source.parse(&spec.prefix, codec));
            match parsed {
                Ok(entries) => {
                    info!(source = %spec.name, entries = entries.len(), "source parsed");
                    report.entries.extend(entries);
                }
                Err(e) => {
                    warn!(source = %spec.name, error = %e, "failed to load source");
                    report.failures.push((spec.name.clone(), e));
                }
            }
        }

        report
    }

    async fn verify_and_persist(
        &self,
        url: &str,
        format: SourceFormat,
        key: &PublicKey,
        cache_file: &Path,
        content: FetchOutcome,
        signature: FetchOutcome,
    ) -> SourceResult<Source> {
        let sig_cache_file = cache::signature_path(cache_file);

        let verified = std::str::from_utf8(&signature.content)
            .map_err(|e| SourceError::SignatureMalformed {
                reason: format!("signature is not UTF-8: {}", e),
            })
            .and_then(|sig_text| verify_detached(&content.content, sig_text, key));

        if let Err(e) = verified {
            warn!(url, error = %e, "signature check failed, invalidating cache");
            cache::invalidate_pair(cache_file).await;
            return Err(e);
        }

        let text = String::from_utf8(content.content).map_err(|e| SourceError::InvalidContent {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        if !content.from_cache {
            if let Err(e) = cache::write_atomic(cache_file, text.as_bytes()).await {
                warn!(cache_file = %cache_file.display(), error = %e, "failed to cache source");
            }
        }
        if !signature.from_cache {
            if let Err(e) = cache::write_atomic(&sig_cache_file, &signature.content).await {
                warn!(
                    cache_file = %sig_cache_file.display(),
                    error = %e,
                    "failed to cache signature"
                );
            }
        }

        info!(url, "source loaded");
        Ok(Source::new(url.to_string(), format, text))
    }

    fn schedule(
        &self,
        now: DateTime<Utc>,
        outcome: &SourceResult<FetchOutcome>,
    ) -> DateTime<Utc> {
        let delay = match outcome {
            Ok(fetched) => fetched.next_delay,
            Err(_) => self.fetcher.retry_delay(),
        };
        schedule_after(now, delay)
    }
}
