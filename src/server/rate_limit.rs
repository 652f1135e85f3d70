//! Rate limiting for the query endpoint
//!
//! Every query costs several model calls, so `/api/rag` admits queries
//! through a token bucket:
//!
//! ```text
//!   ┌─────────────┐
//!   │   Bucket    │ ← holds at most `capacity` tokens
//!   │  ● ● ● ●    │ ← refills at `refill_rate` tokens per second
//!   └─────────────┘
//!         │
//!         ▼
//!   query arrives:  token available → take it, admit
//!                   bucket empty    → reject with 429
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Tokens are stored multiplied by this, so partial refills aren't lost
const SCALE: u64 = 1000;

/// Thread-safe token bucket
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u64,
    refill_rate: f64,
    tokens_scaled: AtomicU64,
    last_refill: Mutex<Instant>,
}

impl RateLimiter {
    /// Bucket holding up to `capacity` tokens, refilled at `refill_rate`/sec
    pub fn new(capacity: u64, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
            tokens_scaled: AtomicU64::new(capacity.saturating_mul(SCALE)),
            last_refill: Mutex::new(Instant::now()),
        }
    }

    /// Take one token if available
    pub fn try_acquire(&self) -> bool {
        self.refill();
        self.tokens_scaled
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(SCALE)
            })
            .is_ok()
    }

    /// Whole tokens currently available
    pub fn available(&self) -> u64 {
        self.refill();
        self.tokens_scaled.load(Ordering::Acquire) / SCALE
    }

    fn refill(&self) {
        // A poisoned lock only means another thread panicked mid-refill;
        // the Instant inside is still valid
        let mut last = match self.last_refill.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let elapsed = last.elapsed();
        let added = scaled_tokens(elapsed, self.refill_rate);
        if added == 0 {
            return;
        }
        *last = Instant::now();

        let max = self.capacity.saturating_mul(SCALE);
        let _ = self
            .tokens_scaled
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(added).min(max))
            });
    }
}

fn scaled_tokens(elapsed: Duration, rate: f64) -> u64 {
    (elapsed.as_secs_f64() * rate * SCALE as f64) as u64
}
