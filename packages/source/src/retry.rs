//! Orchestrator-side retry for archive downloads.
//!
//! A [`Retriever`] makes exactly one request per call. Whether a failed
//! download is attempted again is the caller's decision, expressed as a
//! [`RetryPolicy`]. The default policy never retries, so a failure is
//! reported straight back and the source is skipped.
//!
//! # Usage
//!
//! ```ignore
//! let policy = RetryPolicy::new(2);
//! let bytes = retry::fetch_with_retry(&retriever, &url, &policy).await?;
//! ```

use std::time::Duration;

use crate::TransportFailure;
use crate::fetch::Retriever;

/// Backoff unit. Attempt `n` (1-based) waits `BASE_DELAY * 2^n`, giving
/// 2s, 4s, 8s, ...
const BASE_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on the backoff exponent so the delay cannot overflow.
const MAX_BACKOFF_SHIFT: u32 = 10;

/// How many extra attempts to make after a transient download failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first (0 = single attempt).
    pub max_retries: u32,
    /// Backoff unit; see [`BASE_DELAY`].
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with `max_retries` extra attempts and the default
    /// backoff unit.
    #[must_use]
    pub const fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: BASE_DELAY,
        }
    }

    /// Delay to wait before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << attempt.min(MAX_BACKOFF_SHIFT))
    }
}

/// Fetches `url`, retrying transient failures according to `policy`.
///
/// Non-transient failures (HTTP 4xx other than 429) are returned
/// immediately.
///
/// # Errors
///
/// Returns the last [`TransportFailure`] once retries are exhausted or a
/// permanent failure is seen.
pub async fn fetch_with_retry(
    retriever: &dyn Retriever,
    url: &str,
    policy: &RetryPolicy,
) -> Result<Vec<u8>, TransportFailure> {
    let mut attempt = 0;

    loop {
        match retriever.fetch(url).await {
            Ok(body) => return Ok(body),
            Err(failure) => {
                if !failure.transient || attempt >= policy.max_retries {
                    return Err(failure);
                }
                attempt += 1;
                let delay = policy.delay_for(attempt);
                log::warn!(
                    "  retry {attempt}/{} for {url} in {delay:?} ({})",
                    policy.max_retries,
                    failure.message
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
