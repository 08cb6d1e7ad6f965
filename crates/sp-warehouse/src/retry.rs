//! Per-attempt timeout and bounded retry for capability calls

use crate::error::{CapabilityError, CapabilityResult};
use sp_core::config::ServiceConfig;
use std::future::Future;
use std::time::Duration;

/// Time and retry budget applied to every external call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Limit for a single attempt
    pub timeout: Duration,
    /// Additional attempts after the first, for retryable failures only
    pub max_retries: u32,
    /// Delay before retry `n` is `backoff * n`
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_retries: config.max_retries,
            backoff: config.retry_backoff(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ServiceConfig::default())
    }
}

/// Run `call` under `policy`.
///
/// Each attempt is bounded by `policy.timeout`. Transient failures and
/// timeouts are retried up to `policy.max_retries` times; any other error is
/// returned immediately.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    service: &'static str,
    mut call: F,
) -> CapabilityResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CapabilityResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        let result = match tokio::time::timeout(policy.timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(CapabilityError::Timeout {
                service,
                timeout_ms: u64::try_from(policy.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };

        match result {
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.backoff * attempt;
                log::warn!(
                    "{} (retry {}/{} in {:?})",
                    err,
                    attempt,
                    policy.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
#[path = "retry_test.rs"]
mod tests;
