//! Local cache layer for source files.
//!
//! Every source is cached as a pair of plain files, with no metadata file:
//!
//! ```text
//! <cache_file>           # verified content bytes
//! <cache_file>.minisig   # detached signature text
//! ```
//!
//! Freshness is derived from the file modification time alone.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::debug;

use crate::error::{SourceError, SourceResult};
use crate::types::SIGNATURE_SUFFIX;

/// A cache file read back from disk.
#[derive(Debug, Clone)]
pub struct CachedFile {
    /// Raw file content.
    pub content: Vec<u8>,

    /// Last modification time.
    pub modified: DateTime<Utc>,
}

impl CachedFile {
    /// Delay until this file leaves the freshness window, zero once stale.
    pub fn delay_until_stale(&self, freshness: Duration, now: DateTime<Utc>) -> Duration {
        delay_until_stale(self.modified, freshness, now)
    }
}

/// Path of the signature file paired with `cache_file`.
pub fn signature_path(cache_file: &Path) -> PathBuf {
    let mut name = cache_file.as_os_str().to_owned();
    name.push(SIGNATURE_SUFFIX);
    PathBuf::from(name)
}

/// Read a cache file together with its modification time.
///
/// Returns `Ok(None)` when the file is missing or cannot be stat'ed.
/// Any other I/O failure is a [`SourceError::Cache`].
pub async fn read_if_present(path: &Path) -> SourceResult<Option<CachedFile>> {
    let metadata = match fs::metadata(path).await {
        Ok(m) => m,
        Err(e) => {
            debug!(cache_file = %path.display(), error = %e, "cache file not present");
            return Ok(None);
        }
    };
    let modified = metadata.modified().map_err(|e| SourceError::Cache {
        message: format!("failed to read mtime of {}: {}", path.display(), e),
    })?;

    let content = match fs::read(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(SourceError::Cache {
                message: format!("failed to read {}: {}", path.display(), e),
            })
        }
    };

    Ok(Some(CachedFile {
        content,
        modified: DateTime::<Utc>::from(modified),
    }))
}

/// Write `content` so that readers see either the old or the new file.
///
/// Content goes to a uniquely named temp file in the same directory, which
/// is then renamed over `path`.
pub async fn write_atomic(path: &Path, content: &[u8]) -> SourceResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| SourceError::Cache {
                message: format!("failed to create cache directory: {}", e),
            })?;
    }

    let temp_path = temp_path_for(path);

    if let Err(e) = fs::write(&temp_path, content).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(SourceError::Cache {
            message: format!("failed to write temp file: {}", e),
        });
    }

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(SourceError::Cache {
            message: format!("failed to rename temp file: {}", e),
        });
    }

    Ok(())
}

/// Best-effort removal; a missing file is not an error.
pub async fn remove(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!(cache_file = %path.display(), "removed cache file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => debug!(cache_file = %path.display(), error = %e, "failed to remove cache file"),
    }
}

/// Remove a content file and its signature file together.
pub async fn invalidate_pair(cache_file: &Path) {
    remove(cache_file).await;
    remove(&signature_path(cache_file)).await;
}

pub(crate) fn delay_until_stale(
    modified: DateTime<Utc>,
    freshness: Duration,
    now: DateTime<Utc>,
) -> Duration {
    // A modification time in the future counts as "just written".
    let elapsed = (now - modified).to_std().unwrap_or(Duration::ZERO);
    freshness.saturating_sub(elapsed)
}

fn temp_path_for(path: &Path) -> PathBuf {
    use rand::Rng;

    let suffix: u64 = rand::thread_rng().gen();
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{:016x}.tmp", suffix));
    PathBuf::from(name)
}
