//! HTTP layer: status mapping and retry.
//!
//! This is the ONLY place for status code handling. client/mod.rs never
//! interprets status codes.

use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;
use tracing::warn;

use crate::error::{SourceError, SourceResult};

/// HTTP backend for making requests (holds reqwest client and retry budget).
#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    pub(crate) client: reqwest::Client,
    pub(crate) max_retries: u32,
}

impl HttpBackend {
    /// GET `url` and return the body; any non-2xx status is an error.
    pub(crate) async fn get(&self, url: &str) -> SourceResult<Vec<u8>> {
        let mut retries = 0;

        loop {
            match self.get_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && retries < self.max_retries => {
                    retries += 1;
                    let backoff = backoff_for(&e, retries);

                    warn!(
                        url,
                        error = %e,
                        retry = retries,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis(),
                        "retrying request"
                    );

                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once(&self, url: &str) -> SourceResult<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status.is_success() {
            let body = response.bytes().await?;
            return Ok(body.to_vec());
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(SourceError::RateLimited {
                url: url.to_string(),
                retry_after,
            });
        }

        Err(SourceError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

fn backoff_for(err: &SourceError, retries: u32) -> Duration {
    match err {
        SourceError::RateLimited {
            retry_after: Some(retry_after),
            ..
        } => {
            let capped = (*retry_after).min(Duration::from_secs(30));
            let base_ms = capped.as_millis() as u64;
            let jitter_factor: f64 = rand::thread_rng().gen_range(0.9_f64..=1.1_f64);
            let jittered_ms = ((base_ms as f64) * jitter_factor).round() as u64;
            Duration::from_millis(jittered_ms.max(100))
        }
        _ => {
            let base_backoff =
                Duration::from_secs(1 << retries.min(5)).min(Duration::from_secs(30));
            let jittered_ms = rand::thread_rng().gen_range(0..=base_backoff.as_millis() as u64);
            Duration::from_millis(jittered_ms.max(10))
        }
    }
}
