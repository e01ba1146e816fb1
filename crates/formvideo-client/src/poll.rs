use std::time::Duration;

/// How long and how often [`Client::wait`](crate::Client::wait) polls.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Delay before the second status request.
    pub interval: Duration,
    /// Give up after this long; `None` waits indefinitely.
    pub max_wait: Option<Duration>,
    /// Multiplier applied to the interval after every poll. `1.0` polls at a fixed rate.
    pub backoff_factor: f64,
    /// Upper bound for the grown interval.
    pub max_interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_wait: Some(Duration::from_secs(30 * 60)),
            backoff_factor: 1.0,
            max_interval: Duration::from_secs(60),
        }
    }
}

impl PollPolicy {
    pub fn next_interval(&self, current: Duration) -> Duration {
        if self.backoff_factor <= 1.0 {
            return current;
        }
        current.mul_f64(self.backoff_factor).min(self.max_interval.max(current))
    }
}
