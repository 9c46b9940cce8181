//! Retry Wrapper
//!
//! Re-runs one logical step when the store reports a transient failure.
//! Effects are not deduplicated: when a write lands but its confirmation is
//! lost, the retry applies it a second time.

use std::time::Duration;

use crate::engine::InventoryError;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; values below 1 behave as 1.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Same attempt budget, no pause. Tests use this.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Run `op`, retrying transient store failures.
    ///
    /// Any other error is returned at once. When the attempts run out the last
    /// store error comes back as [`InventoryError::TransientStoreFailure`].
    pub fn run<T>(
        &self,
        step: &str,
        mut op: impl FnMut() -> Result<T, InventoryError>,
    ) -> Result<T, InventoryError> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            #[cfg(feature = "tracing")]
            let _span = tracing_helpers::retry_span(step, attempt).entered();

            match op() {
                Ok(value) => return Ok(value),
                Err(InventoryError::Store(source)) if source.is_transient() => {
                    if attempt >= max_attempts {
                        log::error!("{step}: giving up after {attempt} attempt(s): {source}");
                        return Err(InventoryError::TransientStoreFailure {
                            attempts: attempt,
                            source,
                        });
                    }
                    log::warn!(
                        "{step}: attempt {attempt}/{max_attempts} failed ({source}), retrying in {:?}",
                        self.backoff
                    );
                    #[cfg(feature = "metrics")]
                    METRICS.record_retry(step);
                    if !self.backoff.is_zero() {
                        // Parks only the calling coroutine when run inside one.
                        may::coroutine::sleep(self.backoff);
                    }
                    attempt += 1;
                }
                Err(other) => return Err(other),
            }
        }
    }
}
