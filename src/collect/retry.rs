//! Bounded retry for feed requests
//!
//! A rate-limited response backs off exponentially (`base × 2^attempt`).
//! Transport failures wait the base delay. Any other failure gives up
//! at once. Running out of attempts yields `None`, never an error.

use crate::config::RetryConfig;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

/// Failure of a single feed request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("rate limited")]
    RateLimited,

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::RateLimited | FetchError::Transport(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts including the first try
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Wait before the next try after the `attempt`-th failure (1-based)
    pub fn delay_for(&self, err: &FetchError, attempt: u32) -> Duration {
        match err {
            FetchError::RateLimited => {
                let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
            _ => self.base_delay,
        }
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Some(value),
                Err(e) if !e.is_retryable() => {
                    error!("{}: {}, giving up", label, e);
                    return None;
                }
                Err(e) => {
                    if attempt >= self.max_attempts {
                        error!("{}: {} after {} attempts", label, e, attempt);
                        return None;
                    }
                    let delay = self.delay_for(&e, attempt);
                    warn!(
                        "{}: {}, retrying in {:?} ({}/{})",
                        label, e, delay, attempt, self.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
