//! Blocking delays
//!
//! Settle delays, travel-time waits and the abort grace period all go
//! through a [`Sleeper`] so they can be shortened or recorded.

use std::time::Duration;

/// Blocks the calling thread
pub trait Sleeper: Send + Sync {
    /// Block for `duration`
    fn sleep(&self, duration: Duration);
}

/// Sleeps for the full requested duration
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Sleeps for a fixed fraction of the requested duration
///
/// The dry-run binary uses this to replay rig timing faster than real time.
#[derive(Debug, Clone, Copy)]
pub struct ScaledSleeper {
    factor: f64,
}

impl ScaledSleeper {
    /// Create a sleeper scaling every delay by `factor` (clamped to `0.0..=1.0`)
    pub fn new(factor: f64) -> Self {
        let factor = if factor.is_finite() {
            factor.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { factor }
    }

    /// Scaled duration for a requested delay
    pub fn scaled(&self, duration: Duration) -> Duration {
        duration.mul_f64(self.factor)
    }
}

impl Sleeper for ScaledSleeper {
    fn sleep(&self, duration: Duration) {
        ThreadSleeper.sleep(self.scaled(duration));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_sleeper() {
        let s = ScaledSleeper::new(0.1);
        assert_eq!(s.scaled(Duration::from_secs(10)), Duration::from_secs(1));
        assert_eq!(ScaledSleeper::new(5.0).scaled(Duration::from_secs(2)), Duration::from_secs(2));
        assert_eq!(ScaledSleeper::new(f64::NAN).scaled(Duration::from_secs(2)), Duration::ZERO);
    }
}
