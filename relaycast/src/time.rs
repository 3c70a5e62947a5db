//! Time provider abstraction for the retry tick.
//!
//! The router never reads the wall clock directly; it schedules all
//! recurring work through a [`TimeProvider`] so tests can drive the
//! retry queue deterministically (in practice via tokio's paused
//! clock, or via a bespoke provider).

use async_trait::async_trait;
use std::time::Duration;

/// Provider trait for time operations.
///
/// `now()` is monotonic time elapsed since provider creation; deadlines
/// are expressed in that timeline, which keeps scheduling independent of
/// the wall clock.
#[async_trait(?Send)]
pub trait TimeProvider: Clone {
    /// Sleep for the specified duration.
    async fn sleep(&self, duration: Duration);

    /// Get elapsed time since provider creation.
    fn now(&self) -> Duration;
}

/// Real time provider using tokio's time facilities.
///
/// Under `tokio::time::pause()` (for example
/// `#[tokio::test(start_paused = true)]`) sleeps auto-advance, which
/// makes retry timing tests deterministic without a separate fake
/// clock.
#[derive(Debug, Clone)]
pub struct TokioTimeProvider {
    start: tokio::time::Instant,
}

impl TokioTimeProvider {
    /// Create a new tokio time provider.
    pub fn new() -> Self {
        Self {
            start: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl TimeProvider for TokioTimeProvider {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}
