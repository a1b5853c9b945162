use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts against the primary method (capped further by the step's own budget).
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
    pub jitter: bool,
    /// Pause between fallback methods.
    pub fallback_pause: Duration,
    /// Session failures after which a method is skipped for that action.
    pub demotion_threshold: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(600),
            factor: 1.5,
            max_delay: Duration::from_secs(4),
            jitter: true,
            fallback_pause: Duration::from_millis(500),
            demotion_threshold: 3,
        }
    }
}
