//! Rate limiting for connection dispatch

use governor::clock::{Clock, DefaultClock};
use governor::{state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;

/// Caps how many connection tasks are dispatched per second
///
/// Token bucket via the governor crate with a burst of one, so dispatches are
/// spread evenly over each second. The orchestrator owns a single instance;
/// it never blocks on it, it asks when the next permit will be available.
pub struct ConnectRateLimiter {
    limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    clock: DefaultClock,
    rate: Option<f64>,
}

impl ConnectRateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    /// * `rate` - Optional dispatches per second. None, zero or negative disables limiting.
    ///
    /// # Examples
    /// ```
    /// use thunder_core::orchestrator::ConnectRateLimiter;
    ///
    /// let limiter = ConnectRateLimiter::new(Some(250.0));
    /// assert!(limiter.is_enabled());
    ///
    /// let unlimited = ConnectRateLimiter::new(None);
    /// assert!(unlimited.try_acquire().is_ok());
    /// ```
    pub fn new(rate: Option<f64>) -> Self {
        let clock = DefaultClock::default();
        let limiter = rate.and_then(|per_sec| {
            if !per_sec.is_finite() || per_sec <= 0.0 {
                return None;
            }
            // Periods below a nanosecond fall back to the coarsest per-second quota
            let quota = Quota::with_period(Duration::from_secs_f64(1.0 / per_sec))
                .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX));
            Some(RateLimiter::direct_with_clock(quota, &clock))
        });

        Self {
            limiter,
            clock,
            rate,
        }
    }

    /// Create an unlimited rate limiter
    pub fn unlimited() -> Self {
        Self::new(None)
    }

    /// Take a permit without waiting
    ///
    /// Returns `Err` with the time until the next permit when throttled.
    /// Always succeeds if no rate limit is configured.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        match &self.limiter {
            Some(limiter) => limiter
                .check()
                .map_err(|not_until| not_until.wait_time_from(self.clock.now())),
            None => Ok(()),
        }
    }

    /// Check if rate limiting is enabled
    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    /// Get the configured rate (dispatches per second)
    pub fn rate(&self) -> Option<f64> {
        self.rate
    }
}

impl Default for ConnectRateLimiter {
    fn default() -> Self {
        Self::new(None)
    }
}

impl std::fmt::Debug for ConnectRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectRateLimiter")
            .field("rate", &self.rate)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_disabled() {
        let limiter = ConnectRateLimiter::new(None);
        assert!(!limiter.is_enabled());
        assert!(limiter.rate().is_none());
        assert!(limiter.try_acquire().is_ok());
    }

    #[test]
    fn test_rate_limiter_non_positive_rate() {
        assert!(!ConnectRateLimiter::new(Some(0.0)).is_enabled());
        assert!(!ConnectRateLimiter::new(Some(-10.0)).is_enabled());
        assert!(!ConnectRateLimiter::new(Some(f64::NAN)).is_enabled());
    }

    #[test]
    fn test_rate_limiter_throttles_after_burst() {
        let limiter = ConnectRateLimiter::new(Some(2.0));
        assert!(limiter.is_enabled());
        assert!(limiter.try_acquire().is_ok());

        let wait = limiter.try_acquire().unwrap_err();
        assert!(wait > Duration::ZERO);
        assert!(wait <= Duration::from_millis(500));
    }

    #[test]
    fn test_rate_limiter_sub_one_rate() {
        let limiter = ConnectRateLimiter::new(Some(0.5));
        assert!(limiter.try_acquire().is_ok());
        let wait = limiter.try_acquire().unwrap_err();
        assert!(wait > Duration::from_secs(1));
    }

    #[test]
    fn test_rate_limiter_default() {
        let limiter = ConnectRateLimiter::default();
        assert!(!limiter.is_enabled());
        assert!(!ConnectRateLimiter::unlimited().is_enabled());
    }

    #[test]
    fn test_rate_limiter_debug() {
        let limiter = ConnectRateLimiter::new(Some(100.0));
        let debug = format!("{:?}", limiter);
        assert!(debug.contains("ConnectRateLimiter"));
        assert!(debug.contains("100.0"));
        assert!(debug.contains("true"));
    }
}
