//! Client configuration

use std::time::Duration;

/// Default delay before the first reconnect
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);
/// Default number of reconnect attempts
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// StreamClient settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamClientConfig {
    /// Event feed URL, e.g. `ws://localhost:8080/ws`
    pub url: String,
    /// Delay before reconnect attempt `n` is `base_delay * 2^(n-1)`
    pub base_delay: Duration,
    /// Reconnect attempts before giving up
    pub max_attempts: u32,
    /// Upper bound on a single connect attempt
    pub connect_timeout: Duration,
}

impl StreamClientConfig {
    /// Defaults for `url`
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            base_delay: DEFAULT_BASE_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Set the base reconnect delay
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the reconnect cap
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Delay before reconnect attempt `attempt` (1-based)
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StreamClientConfig::new("ws://localhost:8080/ws");
        assert_eq!(config.base_delay, Duration::from_millis(1000));
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_doubles() {
        let config = StreamClientConfig::new("ws://x");
        let delays: Vec<u64> = (1..=5)
            .map(|n| config.backoff_delay(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
    }

    #[test]
    fn test_backoff_saturates() {
        let config = StreamClientConfig::new("ws://x");
        assert_eq!(config.backoff_delay(200), config.backoff_delay(32));
    }
}
