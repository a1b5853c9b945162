//! Escalation routines run after retries and fallbacks are exhausted.

use std::time::Duration;

use deskrun_core::{ActionResult, ErrorClass, Method};

use crate::executor::{AttemptRunner, BackendRegistry, StepRequest, SYSTEM_NATIVE};
use crate::verify::Verifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryConfig {
    /// Pause after resetting backends.
    pub settle: Duration,
    pub attempts: u32,
    pub attempt_pause: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(1500),
            attempts: 2,
            attempt_pause: Duration::from_secs(1),
        }
    }
}

pub struct Recovery {
    config: RecoveryConfig,
}

impl Recovery {
    pub fn new(config: RecoveryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Resets every backend, lets the desktop settle and re-runs the step through the executor
    /// that natively owns the action. Returns `None` when the class must not be retried.
    pub async fn full_reset(
        &self,
        registry: &BackendRegistry,
        runner: &dyn AttemptRunner,
        step: &StepRequest,
        class: ErrorClass,
    ) -> Option<ActionResult> {
        if !class.is_retryable() {
            tracing::debug!(step_id = %step.step_id, %class, "full reset skipped for non-retryable class");
            return None;
        }
        tracing::warn!(step_id = %step.step_id, action = %step.action, %class, "full reset");
        registry.reset_all().await;
        tokio::time::sleep(self.config.settle).await;

        let request = if SYSTEM_NATIVE.contains(&step.action.as_str()) {
            step.with_method(Method::System)
        } else {
            step.clone()
        };

        let mut last = None;
        for attempt in 1..=self.config.attempts.max(1) {
            let r = runner.run_attempt(&request).await;
            if r.success {
                tracing::info!(step_id = %step.step_id, attempt, "step recovered after full reset");
                return Some(r);
            }
            tracing::warn!(step_id = %step.step_id, attempt, error = %r.error, "post-reset attempt failed");
            last = Some(r);
            if attempt < self.config.attempts {
                tokio::time::sleep(self.config.attempt_pause).await;
            }
        }
        last
    }

    /// Waits and re-checks; if the world still disagrees, re-runs the step once and checks again.
    pub async fn recover_verify_failure(
        &self,
        verifier: &Verifier,
        runner: &dyn AttemptRunner,
        step: &StepRequest,
    ) -> bool {
        tokio::time::sleep(verifier.config().retry_wait).await;
        if verifier.verify(step).await {
            tracing::info!(step_id = %step.step_id, "verification passed after extended wait");
            return true;
        }
        tracing::info!(step_id = %step.step_id, action = %step.action, "re-executing unverified step");
        let r = runner.run_attempt(step).await;
        r.success && verifier.verify(step).await
    }
}

impl Default for Recovery {
    fn default() -> Self {
        Self::new(RecoveryConfig::default())
    }
}
