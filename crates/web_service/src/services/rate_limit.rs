use std::time::Duration;

use log::{info, warn};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::AppError;

/// Global cooldown between accepted requests.
#[derive(Debug)]
pub struct RateLimiter {
    limit: Option<Duration>,
    wait: bool,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(limit_seconds: Option<u64>, wait: bool) -> Self {
        Self {
            limit: limit_seconds.map(Duration::from_secs),
            wait,
            last_request: Mutex::new(None),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None, false)
    }

    /// Admits the request, sleeping out the cooldown in wait mode or failing
    /// with [`AppError::RateLimited`] otherwise.
    pub async fn check(&self) -> Result<(), AppError> {
        let Some(limit) = self.limit else {
            return Ok(());
        };

        let wait_secs = {
            let mut last_request = self.last_request.lock().await;
            let now = Instant::now();
            match *last_request {
                None => {
                    *last_request = Some(now);
                    return Ok(());
                }
                Some(last) if now.duration_since(last) > limit => {
                    *last_request = Some(now);
                    return Ok(());
                }
                Some(last) => remaining_secs(limit, now.duration_since(last)),
            }
        };

        if !self.wait {
            warn!("Rate limit exceeded. Need to wait {wait_secs} more seconds.");
            return Err(AppError::RateLimited {
                retry_after: wait_secs,
            });
        }

        warn!("Rate limit reached. Waiting {wait_secs} seconds before proceeding...");
        tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        *self.last_request.lock().await = Some(Instant::now());
        info!("Rate limit wait completed, proceeding with request");
        Ok(())
    }
}

/// Whole seconds left in the cooldown, rounded up.
fn remaining_secs(limit: Duration, elapsed: Duration) -> u64 {
    let remaining = limit.saturating_sub(elapsed);
    let secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_limit_always_admits() {
        let limiter = RateLimiter::disabled();
        for _ in 0..5 {
            assert!(limiter.check().await.is_ok());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fail_fast_reports_rounded_up_wait() {
        let limiter = RateLimiter::new(Some(5), false);
        assert!(limiter.check().await.is_ok());

        tokio::time::advance(Duration::from_millis(1500)).await;
        match limiter.check().await {
            Err(AppError::RateLimited { retry_after }) => assert_eq!(retry_after, 4),
            other => panic!("expected rate limit, got {other:?}"),
        }

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(limiter.check().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_mode_sleeps_then_admits() {
        let limiter = RateLimiter::new(Some(3), true);
        limiter.check().await.expect("first request");

        let started = Instant::now();
        limiter.check().await.expect("second request");
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[test]
    fn remaining_rounds_partial_seconds_up() {
        assert_eq!(remaining_secs(Duration::from_secs(5), Duration::from_secs(5)), 0);
        assert_eq!(remaining_secs(Duration::from_secs(5), Duration::from_millis(4001)), 1);
        assert_eq!(remaining_secs(Duration::from_secs(5), Duration::ZERO), 5);
    }
}
