//! Token bucket rate limiter for the optional speed limit
//!
//! The bucket holds at most one second worth of tokens. A chunk larger
//! than the available tokens drives the bucket negative and the caller
//! sleeps until the debt is repaid, so chunk size never matters.

use std::time::Duration;
use tokio::time::Instant;

/// Per-transfer rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    /// Bytes per second, None for unlimited
    bytes_per_second: Option<u64>,
    /// Available tokens; negative while paying off an oversized chunk
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a limiter; `None` or `Some(0)` means unlimited
    pub fn new(bytes_per_second: Option<u64>) -> Self {
        let bytes_per_second = bytes_per_second.filter(|limit| *limit > 0);
        Self {
            bytes_per_second,
            tokens: bytes_per_second.unwrap_or(0) as f64,
            last_refill: Instant::now(),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn is_unlimited(&self) -> bool {
        self.bytes_per_second.is_none()
    }

    /// Wait until `bytes` may be written
    pub async fn acquire(&mut self, bytes: u64) {
        let Some(rate) = self.bytes_per_second else {
            return;
        };

        self.refill(rate);
        self.tokens -= bytes as f64;

        if self.tokens < 0.0 {
            let wait = Duration::from_secs_f64(-self.tokens / rate as f64);
            tokio::time::sleep(wait).await;
        }
    }

    fn refill(&mut self, rate: u64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate as f64).min(rate as f64);
        self.last_refill = now;
    }
}
