use std::time::Duration;

use crate::retry::config::RetryConfig;

/// Delay before the next attempt on the same method.
///
/// - `attempt_no`: 1-based number of the attempt that just failed.
/// - `rand_unit`: source of uniform values in `[0, 1)` for jitter.
///
/// Exponential: `base * factor^(attempt_no-1)` capped at `max_delay`, then scaled by a
/// jitter factor in `[0.8, 1.2)` when enabled.
pub fn backoff_delay(cfg: &RetryConfig, attempt_no: u32, rand_unit: impl Fn() -> f64) -> Duration {
    let exp = attempt_no.saturating_sub(1) as i32;
    let raw = (cfg.base_delay.as_millis() as f64) * cfg.factor.powi(exp);
    let capped = raw.min(cfg.max_delay.as_millis() as f64).max(0.0);
    let ms = if cfg.jitter {
        capped * (0.8 + rand_unit().clamp(0.0, 1.0) * 0.4)
    } else {
        capped
    };
    Duration::from_millis(ms.round() as u64)
}
