//! Slew-rate limiter.
//!
//! Bounds how fast a command may change: successive outputs differ by at
//! most `positive_limit · Δt` upward and `|negative_limit| · Δt` downward,
//! with limits in units per second and timestamps in milliseconds.
//!
//! The limiter is a pure function of elapsed time. It never reads a clock;
//! the caller passes `now` so the same instance behaves identically under a
//! wall clock, a manual test clock or a replayed log.

use chopper_common::clock::Millis;

const MS_PER_SECOND: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiter {
    positive_limit: f64,
    negative_limit: f64,
    last_value: f64,
    last_timestamp: Millis,
}

impl RateLimiter {
    /// Limiter with separate rising and falling rates.
    ///
    /// `negative_limit` is expected to be below zero.
    pub const fn new(positive_limit: f64, negative_limit: f64, initial: f64, now: Millis) -> Self {
        Self {
            positive_limit,
            negative_limit,
            last_value: initial,
            last_timestamp: now,
        }
    }

    /// Same rate in both directions.
    pub fn symmetric(limit: f64, initial: f64, now: Millis) -> Self {
        let limit = limit.abs();
        Self::new(limit, -limit, initial, now)
    }

    /// Advance to `now` and move toward `input` as far as the limits allow.
    ///
    /// A timestamp older than the previous call counts as zero elapsed time.
    #[inline]
    pub fn calculate(&mut self, input: f64, now: Millis) -> f64 {
        let elapsed_s = now.saturating_sub(self.last_timestamp) as f64 / MS_PER_SECOND;
        let delta = (input - self.last_value)
            .min(self.positive_limit * elapsed_s)
            .max(self.negative_limit * elapsed_s);
        self.last_value += delta;
        self.last_timestamp = self.last_timestamp.max(now);
        self.last_value
    }

    /// Last output, without advancing time.
    #[inline]
    pub const fn last_value(&self) -> f64 {
        self.last_value
    }

    #[inline]
    pub const fn last_timestamp(&self) -> Millis {
        self.last_timestamp
    }

    #[inline]
    pub const fn positive_limit(&self) -> f64 {
        self.positive_limit
    }

    #[inline]
    pub const fn negative_limit(&self) -> f64 {
        self.negative_limit
    }

    /// Reinitialize limits and value, jumping straight to `initial`.
    pub fn reset(&mut self, positive_limit: f64, negative_limit: f64, initial: f64, now: Millis) {
        *self = Self::new(positive_limit, negative_limit, initial, now);
    }

    /// Jump to `value` at `now`, keeping the configured limits.
    pub fn reset_value(&mut self, value: f64, now: Millis) {
        self.last_value = value;
        self.last_timestamp = now;
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn rising_step_is_limited() {
        let mut limiter = RateLimiter::symmetric(0.5, 0.0, 0);
        // 100 ms at 0.5/s allows 0.05
        let out = limiter.calculate(1.0, 100);
        assert!((out - 0.05).abs() < EPS);
        assert!((limiter.last_value() - 0.05).abs() < EPS);
    }

    #[test]
    fn falling_uses_negative_limit() {
        let mut limiter = RateLimiter::new(10.0, -1.0, 1.0, 0);
        let out = limiter.calculate(-1.0, 200);
        assert!((out - 0.8).abs() < EPS);
    }

    #[test]
    fn small_change_passes_through() {
        let mut limiter = RateLimiter::symmetric(2.0, 0.0, 0);
        let out = limiter.calculate(0.1, 100);
        assert!((out - 0.1).abs() < EPS);
    }

    #[test]
    fn zero_elapsed_holds_value() {
        let mut limiter = RateLimiter::symmetric(100.0, 0.25, 500);
        assert!((limiter.calculate(1.0, 500) - 0.25).abs() < EPS);
    }

    #[test]
    fn timestamp_going_backward_counts_as_zero() {
        let mut limiter = RateLimiter::symmetric(1.0, 0.0, 1000);
        assert!((limiter.calculate(1.0, 900) - 0.0).abs() < EPS);
        assert_eq!(limiter.last_timestamp(), 1000);
        assert!((limiter.calculate(1.0, 1100) - 0.1).abs() < EPS);
    }

    #[test]
    fn converges_over_many_steps() {
        let mut limiter = RateLimiter::symmetric(1.0, 0.0, 0);
        let mut now = 0;
        for _ in 0..200 {
            now += 10;
            limiter.calculate(0.75, now);
        }
        assert!((limiter.last_value() - 0.75).abs() < EPS);
    }

    #[test]
    fn reset_bypasses_limit_once() {
        let mut limiter = RateLimiter::symmetric(0.1, 0.0, 0);
        limiter.reset(2.0, -3.0, 0.9, 50);
        assert!((limiter.last_value() - 0.9).abs() < EPS);
        assert_eq!(limiter.positive_limit(), 2.0);
        assert_eq!(limiter.negative_limit(), -3.0);
        // Next call is limited again
        let out = limiter.calculate(-1.0, 150);
        assert!((out - 0.6).abs() < EPS);
    }

    #[test]
    fn reset_value_keeps_limits() {
        let mut limiter = RateLimiter::symmetric(1.0, 0.0, 0);
        limiter.reset_value(5.0, 10);
        assert!((limiter.calculate(0.0, 110) - 4.9).abs() < EPS);
    }
}
