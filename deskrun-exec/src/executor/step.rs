use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use deskrun_core::{ActionResult, ErrorClass, Method};
use futures_util::FutureExt;

use super::backend::{BackendError, BackendReply, StepRequest};
use super::concurrency::ResourceLocks;
use super::registry::BackendRegistry;
use crate::classify::ErrorClassifier;

/// Runs a single attempt of a step and always answers with an [`ActionResult`].
#[async_trait]
pub trait AttemptRunner: Send + Sync {
    async fn run_attempt(&self, step: &StepRequest) -> ActionResult;

    /// Whether `method` can be attempted at all. Fallbacks skip methods that cannot.
    fn can_run(&self, _method: Method) -> bool {
        true
    }
}

/// Resolves a backend for the step, bounds the call by the step timeout and turns every
/// failure mode (error, `false`, timeout, panic) into a classified failed result.
///
/// Attempts on a shared resource are serialized on the method the step resolved to,
/// so a fallback onto the browser waits for the browser like a planned browser step.
#[derive(Clone)]
pub struct StepExecutor {
    registry: Arc<BackendRegistry>,
    classifier: ErrorClassifier,
    locks: ResourceLocks,
}

impl StepExecutor {
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self {
            registry,
            classifier: ErrorClassifier::new(),
            locks: ResourceLocks::new([Method::Browser]),
        }
    }

    pub fn with_locks(mut self, locks: ResourceLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    fn failed(&self, step: &StepRequest, method: Method, message: String) -> ActionResult {
        let class = self.classifier.classify(&message, &step.action, method);
        ActionResult::fail(&step.action, &step.value, method, message, class.error_class)
    }
}

#[async_trait]
impl AttemptRunner for StepExecutor {
    async fn run_attempt(&self, step: &StepRequest) -> ActionResult {
        let Some(method) = self.registry.resolve(&step.action, step.method) else {
            return self.failed(
                step,
                step.method,
                format!("no executor available for {} via {}", step.action, step.method),
            );
        };
        let Some(backend) = self.registry.get(method) else {
            return self.failed(step, method, format!("no backend registered for {method}"));
        };

        let request = step.with_method(method);
        let _permit = self.locks.acquire(&step.action, method).await;
        let started = Instant::now();
        tracing::debug!(step_id = %step.step_id, action = %step.action, %method, "executing step");

        let call = AssertUnwindSafe(backend.execute(&request)).catch_unwind();
        let result = match tokio::time::timeout(step.timeout, call).await {
            Err(_) => ActionResult::fail(
                &step.action,
                &step.value,
                method,
                format!("TimeoutError after {}ms", step.timeout.as_millis()),
                ErrorClass::Timeout,
            ),
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(step_id = %step.step_id, %message, "backend panicked");
                ActionResult::fail(
                    &step.action,
                    &step.value,
                    method,
                    format!("unexpected fault: {message}"),
                    ErrorClass::Unknown,
                )
            }
            Ok(Ok(Err(BackendError::Failed(message)))) => self.failed(step, method, message),
            Ok(Ok(Err(e @ BackendError::Unavailable(_)))) => self.failed(step, method, e.to_string()),
            Ok(Ok(Ok(BackendReply::Done(true)))) => {
                ActionResult::ok(&step.action, &step.value, method)
            }
            Ok(Ok(Ok(BackendReply::Done(false)))) => {
                self.failed(step, method, format!("{} returned false", step.action))
            }
            Ok(Ok(Ok(BackendReply::Detailed(r)))) => {
                if r.success {
                    r
                } else {
                    let class = self.classifier.classify_result(&r).error_class;
                    r.reclassify(class)
                }
            }
        };

        result.with_method(method).with_elapsed(started.elapsed())
    }

    fn can_run(&self, method: Method) -> bool {
        self.registry.is_available(method)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
