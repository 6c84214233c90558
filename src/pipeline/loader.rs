//! Image ingestion tolerant of partially written files.
//!
//! A file that just appeared in the watch directory is often still being
//! flushed by an external producer, so decode failures are treated as
//! transient until the retry budget runs out.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use image::DynamicImage;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::debug;

/// Retry schedule for decoding files that may still be mid-write. Delays
/// double per attempt up to the cap.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 500,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, completed_attempts: u32) -> Duration {
        let factor = 1u64 << completed_attempts.min(16);
        let millis = self
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(millis)
    }
}

/// Load and decode an image, retrying while the writer may still be busy.
pub async fn load(path: &Path, policy: &RetryPolicy) -> Result<DynamicImage> {
    retry(policy, || try_decode(path))
        .await
        .with_context(|| format!("Failed to load image {}", path.display()))
}

async fn try_decode(path: &Path) -> Result<DynamicImage> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let image = image::load_from_memory(&bytes)
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    Ok(image)
}

/// Run `op` until it succeeds or the policy's attempt budget is spent,
/// sleeping between attempts.
async fn retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("decode succeeded after {} retries", attempt);
                }
                return Ok(value);
            }
            Err(err) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(err.context(format!("giving up after {attempt} attempts")));
                }
                let delay = policy.delay_for(attempt - 1);
                debug!("attempt #{attempt} failed ({err:#}); retrying in {delay:?}");
                sleep(delay).await;
            }
        }
    }
}
