//! Signed server catalog sources.
//!
//! This crate acquires remotely published server catalogs, providing:
//!
//! - Cache-first fetching with a stale-while-scheduled freshness policy
//! - Detached (minisign) signature verification that fails closed
//! - Atomic caching of verified content/signature pairs
//! - Parsers for the legacy CSV and the `## `-delimited catalog formats
//! - Refresh records and a refresh primitive for an external scheduler
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use std::time::Duration;
//!
//! use source_catalog::{SdnsCodec, SourceManager, SourcesConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let manager = SourceManager::new(SourcesConfig::from_env())?;
//!
//! let acquisition = manager
//!     .acquire(
//!         "https://download.dnscrypt.info/resolvers-list/v2/public-resolvers.md",
//!         "RWQf6LRCGA9i53mlYecO4IzT51TGPpvWucNSCh1CBM0QTaLn73Y7GFO3",
//!         Path::new("public-resolvers.md"),
//!         "v2",
//!         Duration::from_secs(72 * 3600),
//!     )
//!     .await;
//!
//! // Keep these even if the acquisition failed.
//! let refresh = acquisition.refresh;
//! for entry in acquisition.result?.parse("", &SdnsCodec)? {
//!     println!("{} {}", entry.name, entry.stamp);
//! }
//! # let _ = refresh;
//! # Ok(())
//! # }
//! ```
//!
//! # Cache layout
//!
//! `<cache_file>` holds the verified content and `<cache_file>.minisig` the
//! detached signature. A cached copy is always served; once older than the
//! freshness window it only makes the next refresh due immediately.
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `SOURCE_CATALOG_TIMEOUT` | Request timeout in seconds (default: 30) |
//! | `SOURCE_CATALOG_MAX_RETRIES` | Max retries for transient failures (default: 2) |
//! | `SOURCE_CATALOG_FRESHNESS_SECS` | Cache freshness window (default: 86400) |
//! | `SOURCE_CATALOG_RETRY_DELAY_SECS` | Delay before retrying a failed fetch (default: 600) |

pub mod cache;
pub mod client;
pub mod error;
pub mod format;
pub mod prefetch;
pub mod source;
pub mod stamp;
pub mod trust;
pub mod types;

// Re-export main types
pub use client::{FetchOutcome, Fetcher};
pub use error::{SourceError, SourceResult};
pub use prefetch::{refresh_cached_url, Prefetcher, RefreshReport};
pub use source::{Acquisition, LoadReport, SourceManager};
pub use stamp::{SdnsCodec, ServerProperties, ServerStamp, StampCodec, StampError};
pub use trust::{verify_detached, PublicKey, Signature, SignatureAlgorithm};
pub use types::{
    CatalogEntry, RefreshRecord, Source, SourceFormat, SourceSpec, SourcesConfig,
    SIGNATURE_SUFFIX,
};
