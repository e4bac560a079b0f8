use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::WarpError;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
    window_start: Instant,
    admitted_in_window: u32,
}

/// One token bucket shared by every request the process serves.
///
/// The bucket holds `capacity` tokens and drips back at `capacity` per
/// `interval`. Independently, no more than `capacity` requests are admitted
/// within one interval window, so the `capacity + 1`-th request inside an
/// interval is always rejected. There is no per-caller accounting.
#[derive(Debug)]
pub struct RateGate {
    capacity: u32,
    interval: Duration,
    bucket: Mutex<Bucket>,
}

impl RateGate {
    pub fn new(capacity: u32, interval: Duration) -> Self {
        Self::starting_at(capacity, interval, Instant::now())
    }

    pub fn starting_at(capacity: u32, interval: Duration, now: Instant) -> Self {
        Self {
            capacity,
            interval,
            bucket: Mutex::new(Bucket {
                tokens: f64::from(capacity),
                refilled_at: now,
                window_start: now,
                admitted_in_window: 0,
            }),
        }
    }

    pub fn try_acquire(&self) -> Result<(), WarpError> {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&self, now: Instant) -> Result<(), WarpError> {
        let capacity = f64::from(self.capacity);
        let mut bucket = self.bucket.lock();

        if self.interval.is_zero() {
            bucket.tokens = capacity;
            bucket.admitted_in_window = 0;
        } else {
            let elapsed = now.saturating_duration_since(bucket.refilled_at);
            let refill = capacity * elapsed.as_secs_f64() / self.interval.as_secs_f64();
            bucket.tokens = (bucket.tokens + refill).min(capacity);

            if now.saturating_duration_since(bucket.window_start) >= self.interval {
                bucket.window_start = now;
                bucket.admitted_in_window = 0;
            }
        }
        bucket.refilled_at = bucket.refilled_at.max(now);

        if bucket.tokens >= 1.0 && bucket.admitted_in_window < self.capacity {
            bucket.tokens -= 1.0;
            bucket.admitted_in_window += 1;
            Ok(())
        } else {
            tracing::warn!("Rate limit exhausted ({} per {:?})", self.capacity, self.interval);
            Err(WarpError::TooManyRequests)
        }
    }
}
