use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct WatchdogConfig {
    /// How often the timer task wakes up.
    pub tick: Duration,
    /// Expected heartbeat cadence from the execution path.
    pub heartbeat_interval: Duration,
    /// Silence longer than this requests an abort.
    pub heartbeat_timeout: Duration,
    pub process_check_interval: Duration,
    pub resource_check_interval: Duration,
    pub cpu_threshold_pct: f64,
    pub memory_limit_mb: f64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            heartbeat_interval: Duration::from_secs(3),
            heartbeat_timeout: Duration::from_secs(15),
            process_check_interval: Duration::from_secs(5),
            resource_check_interval: Duration::from_secs(8),
            cpu_threshold_pct: 92.0,
            memory_limit_mb: 600.0,
        }
    }
}
