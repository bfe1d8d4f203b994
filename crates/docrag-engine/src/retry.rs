//! Bounded retries with capped binary exponential backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use docrag_core::config::IngestSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Retries after the first attempt.
    max_retries: u32,
    base: Duration,
    cap: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_settings(&IngestSettings::default())
    }
}

impl Backoff {
    pub fn new(max_retries: u32, base: Duration, cap: Duration) -> Self {
        Self { max_retries, base, cap }
    }

    pub fn from_settings(settings: &IngestSettings) -> Self {
        Self::new(
            settings.max_retries,
            Duration::from_millis(settings.retry_base_ms),
            Duration::from_millis(settings.retry_max_ms),
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`,
    /// never more than the cap.
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Upper bound on the time spent sleeping between attempts.
    pub fn max_total_wait(&self) -> Duration {
        (1..=self.max_retries).map(|r| self.delay(r)).sum()
    }

    /// Run `operation` until it succeeds or the retries are used up; the last
    /// error is returned.
    pub async fn retry<F, Fut, T, E>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut retry = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if retry < self.max_retries => {
                    retry += 1;
                    let delay = self.delay(retry);
                    warn!(%label, retry, max = self.max_retries, delay_ms = delay.as_millis() as u64, error = %e, "retrying");
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> Backoff {
        Backoff::new(max_retries, Duration::from_millis(1), Duration::from_millis(4))
    }

    #[test]
    fn delays_double_and_cap() {
        let b = Backoff::new(6, Duration::from_millis(200), Duration::from_secs(5));
        let delays: Vec<_> = (1..=6).map(|r| b.delay(r).as_millis()).collect();
        assert_eq!(delays, vec![200, 400, 800, 1600, 3200, 5000]);
        assert_eq!(b.max_total_wait(), Duration::from_millis(11200));
    }

    #[test]
    fn defaults_come_from_ingest_settings() {
        let b = Backoff::default();
        assert_eq!(b.max_retries(), 3);
        assert_eq!(b.delay(1), Duration::from_millis(200));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let out = fast(3)
            .retry("test", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 { Err(format!("fail {n}")) } else { Ok(n) }
            })
            .await;
        assert_eq!(out, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_with_last_error() {
        let calls = AtomicU32::new(0);
        let out: Result<(), String> = fast(2)
            .retry("test", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(format!("fail {n}"))
            })
            .await;
        assert_eq!(out, Err("fail 2".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3, "one attempt plus two retries");
    }
}
