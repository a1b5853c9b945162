use std::collections::BTreeSet;
use std::time::Duration;

use deskrun_core::Method;

use crate::context::ExecMode;
use crate::recovery::RecoveryConfig;
use crate::retry::RetryConfig;
use crate::rollback::DEFAULT_ROLLBACK_TIMEOUT;
use crate::verify::VerifyConfig;
use crate::watchdog::WatchdogConfig;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub retry: RetryConfig,
    pub watchdog: WatchdogConfig,
    pub verify: VerifyConfig,
    pub recovery: RecoveryConfig,
    pub mode: ExecMode,
    pub rollback_timeout: Duration,
    /// Methods driving a single external resource; their steps never interleave.
    pub shared_methods: BTreeSet<Method>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            watchdog: WatchdogConfig::default(),
            verify: VerifyConfig::default(),
            recovery: RecoveryConfig::default(),
            mode: ExecMode::Live,
            rollback_timeout: DEFAULT_ROLLBACK_TIMEOUT,
            shared_methods: BTreeSet::from([Method::Browser]),
        }
    }
}
