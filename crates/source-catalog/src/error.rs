//! Error types for catalog sources.

use std::time::Duration;

use crate::stamp::StampError;

/// Source errors.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Format selector is neither `v1` nor `v2`.
    #[error("unsupported source format: [{format}]")]
    UnsupportedFormat { format: String },

    /// Public key text does not decode to a verification key.
    #[error("invalid public key: {reason}")]
    InvalidPublicKey { reason: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Network error (connection, body read, client setup).
    #[error("network error for [{url}]: {message}")]
    Network { url: String, message: String },

    /// Webserver answered with a non-2xx status.
    #[error("webserver returned code {status} for [{url}]")]
    HttpStatus { url: String, status: u16 },

    /// Rate limit exceeded.
    #[error("rate limited for [{url}]: retry after {retry_after:?}")]
    RateLimited {
        url: String,
        retry_after: Option<Duration>,
    },

    /// Cache I/O error other than a missing file.
    #[error("cache error: {message}")]
    Cache { message: String },

    /// Detached signature text could not be decoded.
    #[error("malformed signature: {reason}")]
    SignatureMalformed { reason: String },

    /// Signature does not verify against the content.
    #[error("signature verification failed: {reason}")]
    SignatureInvalid { reason: String },

    /// Legacy (v1) row with too few fields.
    #[error("parse error at line {line}")]
    ParseLine { line: usize },

    /// Delimited (v2) document or segment is malformed.
    #[error("invalid format for source at [{url}]")]
    InvalidSource { url: String },

    /// Delimited (v2) entry without a usable stamp line.
    #[error("missing stamp for server [{name}] in source from [{url}]")]
    MissingStamp { name: String, url: String },

    /// Verified content is not valid UTF-8 text.
    #[error("invalid content for source at [{url}]: {message}")]
    InvalidContent { url: String, message: String },

    /// Stamp codec rejected an entry.
    #[error(transparent)]
    Stamp(#[from] StampError),
}

impl SourceError {
    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            // Configuration
            Self::UnsupportedFormat { .. } => 1,
            Self::InvalidPublicKey { .. } => 1,
            Self::Config { .. } => 1,

            // Network/transient
            Self::Network { .. } => 5,
            Self::HttpStatus { .. } => 5,
            Self::RateLimited { .. } => 5,

            // Security issues
            Self::SignatureMalformed { .. } => 4,
            Self::SignatureInvalid { .. } => 4,

            // Other
            Self::Cache { .. } => 6,
            Self::ParseLine { .. } => 7,
            Self::InvalidSource { .. } => 7,
            Self::MissingStamp { .. } => 7,
            Self::InvalidContent { .. } => 7,
            Self::Stamp(_) => 7,
        }
    }

    /// Whether the error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network { .. } => true,
            Self::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether the error came out of the signature check.
    ///
    /// Trust failures always invalidate the cached pair.
    pub fn is_trust_failure(&self) -> bool {
        matches!(
            self,
            Self::SignatureMalformed { .. } | Self::SignatureInvalid { .. }
        )
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            message: err.to_string(),
        }
    }
}

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;
