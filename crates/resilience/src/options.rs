use std::time::Duration;

/// Tuning for one circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerOptions {
    /// How long an action may run before it counts as a failure.
    /// `None` disables the timeout.
    pub timeout: Option<Duration>,

    /// Error percentage (failures and timeouts over calls) at which the
    /// breaker opens.
    pub error_threshold_percentage: u8,

    /// How long the breaker stays open before admitting a probe.
    pub reset_timeout: Duration,

    /// Length of the rolling statistics window.
    pub rolling_window: Duration,

    /// Number of buckets the rolling window is divided into.
    pub rolling_buckets: u32,

    /// Minimum number of calls in the window before the breaker may open.
    pub volume_threshold: u32,
}

impl Default for BreakerOptions {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(15)),
            error_threshold_percentage: 50,
            reset_timeout: Duration::from_secs(10),
            rolling_window: Duration::from_secs(10),
            rolling_buckets: 10,
            volume_threshold: 0,
        }
    }
}

impl BreakerOptions {
    /// Sets the call timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the error percentage that opens the breaker. Values above 100
    /// are clamped.
    pub fn with_error_threshold_percentage(mut self, percentage: u8) -> Self {
        self.error_threshold_percentage = percentage.min(100);
        self
    }

    /// Sets the open-state cool-down.
    pub fn with_reset_timeout(mut self, reset_timeout: Duration) -> Self {
        self.reset_timeout = reset_timeout;
        self
    }

    /// Sets the rolling window length and bucket count.
    pub fn with_rolling_window(mut self, window: Duration, buckets: u32) -> Self {
        self.rolling_window = window;
        self.rolling_buckets = buckets;
        self
    }

    /// Sets the minimum number of calls before the breaker may open.
    pub fn with_volume_threshold(mut self, volume_threshold: u32) -> Self {
        self.volume_threshold = volume_threshold;
        self
    }

    pub(crate) fn bucket_width(&self) -> Duration {
        let width = self.rolling_window / self.rolling_buckets.max(1);
        if width.is_zero() {
            Duration::from_millis(1)
        } else {
            width
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = BreakerOptions::default();
        assert_eq!(options.timeout, Some(Duration::from_secs(15)));
        assert_eq!(options.error_threshold_percentage, 50);
        assert_eq!(options.reset_timeout, Duration::from_secs(10));
        assert_eq!(options.bucket_width(), Duration::from_secs(1));
    }

    #[test]
    fn test_threshold_is_clamped() {
        let options = BreakerOptions::default().with_error_threshold_percentage(250);
        assert_eq!(options.error_threshold_percentage, 100);
    }

    #[test]
    fn test_zero_buckets_uses_whole_window() {
        let options = BreakerOptions::default().with_rolling_window(Duration::from_secs(4), 0);
        assert_eq!(options.bucket_width(), Duration::from_secs(4));
    }
}
