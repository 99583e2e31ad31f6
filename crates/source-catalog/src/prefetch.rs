//! Cache warming for previously acquired URLs.
//!
//! Nothing here sleeps or spawns: an external clock calls
//! [`Prefetcher::refresh_due`] (or [`refresh_cached_url`] directly) at or
//! after [`Prefetcher::next_due`].

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::cache;
use crate::client::Fetcher;
use crate::error::{SourceError, SourceResult};
use crate::types::{schedule_after, RefreshRecord};

/// Refresh one record and reschedule it.
///
/// A cache hit is written back unchanged, which restarts the freshness
/// window. A download is not persisted here: only an acquisition, which
/// verifies the signature, may store downloaded content. Failures are
/// rescheduled after the fetcher's retry delay instead of immediately.
pub async fn refresh_cached_url(
    fetcher: &Fetcher,
    record: &mut RefreshRecord,
) -> SourceResult<()> {
    let fetched = fetcher
        .fetch_with_cache(&record.url, &record.cache_file)
        .await;

    let delay = match &fetched {
        Ok(outcome) => outcome.next_delay,
        Err(_) => fetcher.retry_delay(),
    };
    record.next_eligible = schedule_after(Utc::now(), delay);

    let outcome = fetched?;
    if outcome.from_cache {
        if let Err(e) = cache::write_atomic(&record.cache_file, &outcome.content).await {
            warn!(
                cache_file = %record.cache_file.display(),
                error = %e,
                "failed to rewrite cache file"
            );
        }
    } else {
        debug!(url = %record.url, "downloaded copy left for the next verified acquisition");
    }
    Ok(())
}

/// Per-URL results of a [`Prefetcher::refresh_due`] pass.
#[derive(Debug, Default)]
pub struct RefreshReport {
    /// URLs refreshed successfully.
    pub refreshed: Vec<String>,

    /// URLs whose refresh failed.
    pub failures: Vec<(String, SourceError)>,
}

/// Owns the refresh records of every acquired URL.
#[derive(Debug, Clone)]
pub struct Prefetcher {
    fetcher: Fetcher,
    records: Vec<RefreshRecord>,
}

impl Prefetcher {
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            records: Vec::new(),
        }
    }

    /// Track more records, replacing any existing record for the same URL.
    pub fn track(&mut self, records: impl IntoIterator<Item = RefreshRecord>) {
        for record in records {
            match self.records.iter_mut().find(|r| r.url == record.url) {
                Some(existing) => *existing = record,
                None => self.records.push(record),
            }
        }
    }

    pub fn records(&self) -> &[RefreshRecord] {
        &self.records
    }

    /// Earliest time any tracked URL becomes eligible.
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.records.iter().map(|r| r.next_eligible).min()
    }

    /// Refresh every record due at `now`, once each.
    pub async fn refresh_due(&mut self, now: DateTime<Utc>) -> RefreshReport {
        let mut report = RefreshReport::default();

        for record in self.records.iter_mut().filter(|r| r.is_due(now)) {
            match refresh_cached_url(&self.fetcher, record).await {
                Ok(()) => report.refreshed.push(record.url.clone()),
                Err(e) => {
                    warn!(url = %record.url, error = %e, "refresh failed");
                    report.failures.push((record.url.clone(), e));
                }
            }
        }

        report
    }
}
