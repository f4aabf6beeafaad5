//! Throughput between consecutive progress samples.

use std::time::Instant;

/// Byte count observed at a point in time.
#[derive(Debug, Clone, Copy)]
pub struct RateSample {
    pub bytes: u64,
    pub at: Instant,
}

/// Tracks the last sample and computes instantaneous throughput.
#[derive(Debug)]
pub struct RateTracker {
    last: RateSample,
}

impl RateTracker {
    pub fn new(bytes: u64, at: Instant) -> Self {
        Self {
            last: RateSample { bytes, at },
        }
    }

    pub fn last(&self) -> RateSample {
        self.last
    }

    /// Record `bytes` at `now`. Returns the rate in bytes per second since the
    /// previous sample, or `None` if nothing was written in between.
    pub fn observe(&mut self, bytes: u64, now: Instant) -> Option<f64> {
        if bytes == self.last.bytes {
            return None;
        }
        let delta = bytes.saturating_sub(self.last.bytes);
        let elapsed_secs = now.saturating_duration_since(self.last.at).as_secs_f64();
        self.last = RateSample { bytes, at: now };
        if elapsed_secs <= 0.0 {
            return Some(0.0);
        }
        Some(delta as f64 / elapsed_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn unchanged_bytes_yield_no_rate() {
        let t0 = Instant::now();
        let mut tracker = RateTracker::new(100, t0);
        assert_eq!(tracker.observe(100, t0 + Duration::from_millis(500)), None);
        assert_eq!(tracker.last().bytes, 100);
        assert_eq!(tracker.last().at, t0);
    }

    #[test]
    fn rate_is_delta_over_elapsed() {
        let t0 = Instant::now();
        let mut tracker = RateTracker::new(0, t0);
        let rate = tracker.observe(1000, t0 + Duration::from_millis(500)).unwrap();
        assert!((rate - 2000.0).abs() < 1e-6);
        let rate = tracker.observe(1500, t0 + Duration::from_millis(1500)).unwrap();
        assert!((rate - 500.0).abs() < 1e-6);
        assert_eq!(tracker.last().bytes, 1500);
    }

    #[test]
    fn zero_elapsed_reports_zero() {
        let t0 = Instant::now();
        let mut tracker = RateTracker::new(0, t0);
        assert_eq!(tracker.observe(10, t0), Some(0.0));
    }
}
