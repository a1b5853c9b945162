mod backoff;
mod config;
mod policy;
mod priority;

pub use backoff::backoff_delay;
pub use config::RetryConfig;
pub use policy::{RetryOutcome, RetryPolicy, SessionStats};
pub use priority::{is_single_method, method_priority, DEFAULT_PRIORITY};
