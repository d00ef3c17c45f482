//! Exponential backoff with symmetric jitter

use std::time::Duration;

use rand::Rng;

use super::error::{ConfigError, ConfigResult};

/// Default delay before the first retry
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1_000);

/// Default maximum delay cap
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Default multiplier applied per attempt
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Default jitter ratio (delay is perturbed by up to ±25%)
pub const DEFAULT_JITTER_RATIO: f64 = 0.25;

/// Maximum exponent for exponential backoff calculation to prevent overflow
pub const MAX_BACKOFF_EXPONENT: u32 = 64;

/// Exponential backoff schedule.
///
/// The raw delay after attempt `k` (0-indexed) is
/// `min(initial_delay * factor^k, max_delay)`. The applied delay multiplies
/// the raw delay by a uniform factor in `[1 - jitter, 1 + jitter]` and floors
/// it to whole milliseconds, so many callers failing together do not retry in
/// lock step.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    factor: f64,
    jitter: f64,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            factor: DEFAULT_BACKOFF_FACTOR,
            jitter: DEFAULT_JITTER_RATIO,
        }
    }
}

impl ExponentialBackoff {
    /// Create a schedule with the default ±25% jitter.
    pub fn new(initial_delay: Duration, max_delay: Duration, factor: f64) -> ConfigResult<Self> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(ConfigError::invalid(format!(
                "backoff factor must be a positive number, got {factor}"
            )));
        }

        if initial_delay > max_delay {
            return Err(ConfigError::invalid(format!(
                "initial_delay ({initial_delay:?}) cannot be greater than max_delay ({max_delay:?})"
            )));
        }

        Ok(Self { initial_delay, max_delay, factor, jitter: DEFAULT_JITTER_RATIO })
    }

    /// Set the jitter ratio (0.0 disables jitter, clamped to `[0, 1]`)
    pub fn with_jitter(mut self, ratio: f64) -> Self {
        self.jitter = if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 0.0 };
        self
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Delay after attempt `attempt` (0-indexed) before jitter is applied.
    pub fn raw_delay(&self, attempt: u32) -> Duration {
        let max_millis = self.max_delay.as_millis() as f64;
        let exponent = attempt.min(MAX_BACKOFF_EXPONENT) as i32;
        let delay_millis = self.initial_delay.as_millis() as f64 * self.factor.powi(exponent);

        if !delay_millis.is_finite() {
            return self.max_delay;
        }

        Duration::from_millis(delay_millis.min(max_millis).max(0.0) as u64)
    }

    /// Jittered delay after attempt `attempt` using the thread-local RNG.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with_rng(attempt, &mut rand::thread_rng())
    }

    /// Jittered delay after attempt `attempt` using the supplied RNG.
    pub fn delay_with_rng<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let raw_millis = self.raw_delay(attempt).as_millis() as f64;
        if self.jitter == 0.0 || raw_millis == 0.0 {
            return Duration::from_millis(raw_millis as u64);
        }

        // clamp to whole milliseconds inside the jitter band
        let lower = (raw_millis * (1.0 - self.jitter)).ceil();
        let upper = (raw_millis * (1.0 + self.jitter)).floor().max(lower);
        let multiplier = rng.gen_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        Duration::from_millis((raw_millis * multiplier).round().clamp(lower, upper) as u64)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn schedule() -> ExponentialBackoff {
        ExponentialBackoff::new(Duration::from_millis(1000), Duration::from_millis(30_000), 2.0)
            .unwrap()
    }

    #[test]
    fn raw_delay_doubles_until_capped() {
        let backoff = schedule();
        let expected = [1000, 2000, 4000, 8000, 16_000, 30_000, 30_000];

        for (attempt, millis) in expected.iter().enumerate() {
            assert_eq!(backoff.raw_delay(attempt as u32), Duration::from_millis(*millis));
        }
    }

    /// Every jittered delay stays within ±25% of the raw delay.
    #[test]
    fn jittered_delay_stays_in_band() {
        let backoff = schedule();
        let mut rng = StdRng::seed_from_u64(42);

        for attempt in 0..8 {
            let raw = backoff.raw_delay(attempt).as_millis() as f64;
            for _ in 0..200 {
                let delay = backoff.delay_with_rng(attempt, &mut rng).as_millis() as f64;
                assert!(delay >= 0.75 * raw, "delay {delay} below band for raw {raw}");
                assert!(delay <= 1.25 * raw, "delay {delay} above band for raw {raw}");
            }
        }
    }

    /// Raw delays that are not a multiple of four still respect the lower
    /// bound exactly.
    #[test]
    fn jitter_band_holds_for_uneven_delays() {
        let backoff =
            ExponentialBackoff::new(Duration::from_millis(1001), Duration::from_millis(1001), 2.0)
                .unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..1000 {
            let delay = backoff.delay_with_rng(0, &mut rng).as_millis();
            assert!((751..=1251).contains(&delay), "delay {delay} outside 751..=1251");
        }
    }

    #[test]
    fn zero_jitter_returns_raw_delay() {
        let backoff = schedule().with_jitter(0.0);
        assert_eq!(backoff.delay(2), Duration::from_millis(4000));
    }

    #[test]
    fn huge_attempts_do_not_overflow() {
        let backoff = schedule();
        assert_eq!(backoff.raw_delay(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn rejects_invalid_configuration() {
        assert!(ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(2), 0.0)
            .is_err());
        assert!(ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(2), f64::NAN)
            .is_err());
        assert!(ExponentialBackoff::new(Duration::from_secs(5), Duration::from_secs(2), 2.0)
            .is_err());
    }
}
