//! Retry budgets for a single dispatch call.
//!
//! Rate-limit retries and general retries are tracked as two independent
//! counters per call: a rate-limit retry never counts against the general
//! retry budget and vice versa. Modeled on
//! `router::circuit_breaker::CircuitBreaker`'s exponential backoff, but
//! scoped to one in-flight call rather than process-wide per-model health.

use std::time::Duration;

/// Configuration for a call's retry behavior.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_rate_limit_attempts: u32,
    pub max_general_attempts: u32,
    /// Gemini-family models get a 1.5x multiplier on rate-limit backoff.
    pub is_gemini_family: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_rate_limit_attempts: 5,
            max_general_attempts: 8,
            is_gemini_family: false,
        }
    }
}

impl RetryConfig {
    pub fn for_model(model_id: &str) -> Self {
        Self {
            is_gemini_family: model_id.contains("gemini"),
            ..Self::default()
        }
    }
}

/// Tracks attempts for the two independent budgets of a single call.
#[derive(Debug, Clone, Default)]
pub struct RetryTracker {
    rate_limit_attempts: u32,
    general_attempts: u32,
    config: RetryConfigHolder,
}

#[derive(Debug, Clone, Copy)]
struct RetryConfigHolder(RetryConfig);

impl Default for RetryConfigHolder {
    fn default() -> Self {
        Self(RetryConfig::default())
    }
}

impl RetryTracker {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            rate_limit_attempts: 0,
            general_attempts: 0,
            config: RetryConfigHolder(config),
        }
    }

    /// Rate-limit backoff: `min(10 * 2^(n-1), 60)` seconds, times 1.5 for
    /// Gemini-family models.
    pub fn rate_limit_backoff(&self) -> Duration {
        let n = self.rate_limit_attempts.max(1);
        let base = (10f64 * 2f64.powi((n - 1) as i32)).min(60.0);
        let scaled = if self.config.0.is_gemini_family {
            base * 1.5
        } else {
            base
        };
        Duration::from_secs_f64(scaled)
    }

    /// General retryable backoff: exponential, base 2s, no cap named in spec
    /// beyond the attempt budget itself.
    pub fn general_backoff(&self) -> Duration {
        let n = self.general_attempts.max(1);
        Duration::from_secs_f64(2f64.powi((n - 1) as i32))
    }

    pub fn record_rate_limit_attempt(&mut self) {
        self.rate_limit_attempts += 1;
    }

    pub fn record_general_attempt(&mut self) {
        self.general_attempts += 1;
    }

    pub fn rate_limit_budget_exhausted(&self) -> bool {
        self.rate_limit_attempts >= self.config.0.max_rate_limit_attempts
    }

    pub fn general_budget_exhausted(&self) -> bool {
        self.general_attempts >= self.config.0.max_general_attempts
    }

    pub fn rate_limit_attempts(&self) -> u32 {
        self.rate_limit_attempts
    }

    pub fn general_attempts(&self) -> u32 {
        self.general_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_backoff_caps_at_60s() {
        let mut tracker = RetryTracker::new(RetryConfig::default());
        for _ in 0..10 {
            tracker.record_rate_limit_attempt();
        }
        assert_eq!(tracker.rate_limit_backoff(), Duration::from_secs(60));
    }

    #[test]
    fn gemini_family_multiplies_by_1_5() {
        let mut tracker = RetryTracker::new(RetryConfig {
            is_gemini_family: true,
            ..Default::default()
        });
        tracker.record_rate_limit_attempt();
        // n=1 => base 10s => *1.5 = 15s
        assert_eq!(tracker.rate_limit_backoff(), Duration::from_secs_f64(15.0));
    }

    #[test]
    fn budgets_are_independent() {
        let mut tracker = RetryTracker::new(RetryConfig {
            max_rate_limit_attempts: 2,
            max_general_attempts: 2,
            is_gemini_family: false,
        });
        tracker.record_rate_limit_attempt();
        tracker.record_rate_limit_attempt();
        assert!(tracker.rate_limit_budget_exhausted());
        assert!(!tracker.general_budget_exhausted());
    }

    #[test]
    fn general_backoff_grows_exponentially() {
        let mut tracker = RetryTracker::new(RetryConfig::default());
        tracker.record_general_attempt();
        assert_eq!(tracker.general_backoff(), Duration::from_secs(1));
        tracker.record_general_attempt();
        assert_eq!(tracker.general_backoff(), Duration::from_secs(2));
        tracker.record_general_attempt();
        assert_eq!(tracker.general_backoff(), Duration::from_secs(4));
    }
}
