//! Retry with exponential backoff for transiently failing operations.
//!
//! Opening the device, setting RF power and starting inventory are all known
//! to fail intermittently right after power-up or USB re-enumeration; one
//! short wait and a second attempt almost always succeeds. [`RetryPolicy`]
//! captures that schedule in one place.
//!
//! The policy only ever sees hard errors. Recoverable outcomes ("no tag
//! yet", "inventory already finished") never become errors in the first
//! place, so they bypass retry entirely.

use std::time::Duration;

use cf591_core::Result;
use tracing::warn;

/// Exponential backoff schedule: `base_delay * multiplier^n` before retry
/// `n` (zero-based).
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first. Values below 1 are
    /// treated as 1.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Growth factor applied per retry.
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Schedule for opening the device, which can take a few seconds to come
    /// up after power-on.
    pub const CONNECT: Self = Self {
        max_attempts: 5,
        base_delay: Duration::from_millis(500),
        multiplier: 1.5,
    };

    /// Schedule for RF power changes.
    pub const POWER: Self = Self {
        max_attempts: 3,
        base_delay: Duration::from_millis(300),
        multiplier: 1.5,
    };

    /// Schedule for inventory starts.
    pub const START_INVENTORY: Self = Self {
        max_attempts: 5,
        base_delay: Duration::from_millis(200),
        multiplier: 1.5,
    };

    /// Build a custom schedule.
    pub const fn new(max_attempts: u32, base_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            multiplier,
        }
    }

    /// A single attempt, no retries.
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Backoff delay after `failed_attempt` failures (1-based).
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        self.base_delay
            .mul_f64(self.multiplier.powi(failed_attempt.saturating_sub(1) as i32))
    }

    /// Run `op`, retrying per the schedule and re-raising the last error
    /// once the attempts are exhausted.
    pub async fn run<T, F>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: AsyncFnMut() -> Result<T>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(%error, attempt, ?delay, "{what} failed, backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf591_core::Error;
    use std::cell::Cell;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), 2.0);
        let calls = Cell::new(0u32);

        let started = Instant::now();
        let result = policy
            .run("test op", async || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err(Error::command("SetPower", 0xFFFF_FF06))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 3);
        // base_delay * (1 + multiplier): 100ms + 200ms.
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn re_raises_after_exhaustion() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10), 1.5);
        let calls = Cell::new(0u32);

        let result: Result<()> = policy
            .run("test op", async || {
                calls.set(calls.get() + 1);
                Err(Error::command("StartInventory", 0xFFFF_FF03))
            })
            .await;

        assert_eq!(calls.get(), 3);
        assert_eq!(result.unwrap_err().status(), Some(0xFFFF_FF03));
    }

    #[tokio::test]
    async fn first_success_needs_no_delay() {
        let policy = RetryPolicy::new(5, Duration::from_secs(60), 2.0);
        let result = policy.run("test op", async || Ok(42)).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn backoff_schedule_is_exponential() {
        let policy = RetryPolicy::new(4, Duration::from_millis(200), 1.5);
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(300));
        assert_eq!(policy.delay_for(3), Duration::from_millis(450));
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let policy = RetryPolicy::new(0, Duration::ZERO, 1.0);
        let calls = Cell::new(0u32);

        let result: Result<()> = policy
            .run("test op", async || {
                calls.set(calls.get() + 1);
                Err(Error::NotOpen)
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
