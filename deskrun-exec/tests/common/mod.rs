#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use deskrun_core::{Method, Plan, PlanStep};
use deskrun_exec::executor::{ActionBackend, BackendError, BackendReply, StepRequest};
use deskrun_exec::{EngineConfig, RecoveryConfig, RetryConfig, VerifyConfig, WatchdogConfig};

type Behavior = Box<dyn Fn(&StepRequest) -> Result<BackendReply, BackendError> + Send + Sync>;

/// Backend whose answer is decided by a closure; records every request it sees.
pub struct ScriptedBackend {
    method: Method,
    available: bool,
    delay: Duration,
    behavior: Behavior,
    calls: Mutex<Vec<StepRequest>>,
    resets: AtomicU32,
}

impl ScriptedBackend {
    pub fn new(
        method: Method,
        behavior: impl Fn(&StepRequest) -> Result<BackendReply, BackendError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            method,
            available: true,
            delay: Duration::ZERO,
            behavior: Box::new(behavior),
            calls: Mutex::new(Vec::new()),
            resets: AtomicU32::new(0),
        }
    }

    pub fn ok(method: Method) -> Self {
        Self::new(method, |_| Ok(BackendReply::Done(true)))
    }

    pub fn failing(method: Method, message: &'static str) -> Self {
        Self::new(method, move |_| Err(BackendError::Failed(message.to_string())))
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<StepRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn actions(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.action).collect()
    }

    pub fn resets(&self) -> u32 {
        self.resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionBackend for ScriptedBackend {
    fn method(&self) -> Method {
        self.method
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn execute(&self, step: &StepRequest) -> Result<BackendReply, BackendError> {
        self.calls.lock().unwrap().push(step.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.behavior)(step)
    }

    async fn reset(&self) -> Result<(), BackendError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        factor: 1.0,
        max_delay: Duration::from_millis(1),
        jitter: false,
        fallback_pause: Duration::ZERO,
        demotion_threshold: 3,
    }
}

/// Engine settings with every pause shortened so tests run in milliseconds.
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        retry: fast_retry(),
        watchdog: WatchdogConfig {
            tick: Duration::from_millis(20),
            ..WatchdogConfig::default()
        },
        verify: VerifyConfig {
            timeout: Duration::from_millis(50),
            poll_interval: Duration::from_millis(10),
            retry_wait: Duration::from_millis(10),
        },
        recovery: RecoveryConfig {
            settle: Duration::ZERO,
            attempts: 1,
            attempt_pause: Duration::ZERO,
        },
        rollback_timeout: Duration::from_secs(1),
        ..EngineConfig::default()
    }
}

pub fn step(action: &str, value: &str, method: &str) -> PlanStep {
    PlanStep::new(action, value, method)
}

pub fn plan(task: &str, steps: Vec<PlanStep>) -> Plan {
    Plan::new(task, steps)
}
