use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use deskrun_core::{ActionResult, ErrorClass, Method};
use serde::Serialize;

use crate::classify::{fallback_method, ClassifiedError, ErrorClassifier};
use crate::executor::{AttemptRunner, StepRequest};
use crate::retry::backoff::backoff_delay;
use crate::retry::config::RetryConfig;
use crate::retry::priority::{is_single_method, method_priority};

/// Result of driving one step through retries and fallbacks.
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    /// The successful result, or the last failure.
    pub result: ActionResult,
    /// Classification of the last failure; `None` on success.
    pub classified: Option<ClassifiedError>,
    /// Backend calls made, across all methods.
    pub attempts: u32,
    /// Same-method retries that consumed the class retry budget.
    pub retries: u32,
    pub methods_tried: Vec<Method>,
}

impl RetryOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.success
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub failure_counts: BTreeMap<String, u32>,
    pub demoted: Vec<String>,
}

/// Per-step retry with backoff, plus a session-scoped fallback chain that demotes methods
/// which keep failing for an action.
pub struct RetryPolicy {
    config: RetryConfig,
    classifier: ErrorClassifier,
    failures: Mutex<HashMap<(String, Method), u32>>,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            classifier: ErrorClassifier::new(),
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Forget all failure counts. Called at the start of every task.
    pub fn reset_session(&self) {
        if let Ok(mut f) = self.failures.lock() {
            f.clear();
        }
    }

    pub fn failure_count(&self, action: &str, method: Method) -> u32 {
        self.failures
            .lock()
            .map(|f| f.get(&(action.to_string(), method)).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn is_demoted(&self, action: &str, method: Method) -> bool {
        self.failure_count(action, method) >= self.config.demotion_threshold
    }

    fn record_failure(&self, action: &str, method: Method) {
        let count = match self.failures.lock() {
            Ok(mut f) => {
                let c = f.entry((action.to_string(), method)).or_insert(0);
                *c += 1;
                *c
            }
            Err(_) => return,
        };
        if count == self.config.demotion_threshold {
            tracing::warn!(action, %method, count, "method demoted for this session");
        }
    }

    /// Methods to try after `failed`, least-failed first. Among equals, the method the
    /// error class points at goes first.
    pub fn fallback_chain(&self, action: &str, failed: Method, class: Option<ErrorClass>) -> Vec<Method> {
        let hinted = class.and_then(|c| fallback_method(c, failed));
        let mut candidates: Vec<Method> = method_priority(action)
            .iter()
            .copied()
            .filter(|m| *m != failed)
            .collect();
        candidates.sort_by_key(|m| (self.failure_count(action, *m), Some(*m) != hinted));
        candidates
    }

    pub fn session_stats(&self) -> SessionStats {
        let Ok(f) = self.failures.lock() else {
            return SessionStats::default();
        };
        let failure_counts: BTreeMap<String, u32> = f
            .iter()
            .map(|((a, m), c)| (format!("{a}:{m}"), *c))
            .collect();
        let demoted = failure_counts
            .iter()
            .filter(|(_, c)| **c >= self.config.demotion_threshold)
            .map(|(k, _)| k.clone())
            .collect();
        SessionStats {
            failure_counts,
            demoted,
        }
    }

    pub async fn execute_with_retry(&self, runner: &dyn AttemptRunner, step: &StepRequest) -> RetryOutcome {
        let action = step.action.as_str();
        let max_attempts = self.config.max_attempts.min(step.max_attempts).max(1);

        let mut attempts = 0u32;
        let mut retries = 0u32;
        let mut methods_tried: Vec<Method> = Vec::new();
        let mut last: Option<ActionResult> = None;
        let mut classified: Option<ClassifiedError> = None;
        let mut method = step.method;

        for attempt in 1..=max_attempts {
            attempts += 1;
            let r = runner
                .run_attempt(&step.with_method(method))
                .await
                .with_attempt(attempts);
            note_method(&mut methods_tried, r.method);
            if r.success {
                return done(r, None, attempts, retries, methods_tried);
            }

            method = r.method;
            self.record_failure(action, method);
            let fresh = self.classifier.classify_result(&r);
            let mut current = match classified.take() {
                Some(prev) if prev.error_class == fresh.error_class => ClassifiedError {
                    message: fresh.message,
                    ..prev
                },
                _ => fresh,
            };
            tracing::debug!(
                step_id = %step.step_id, action, %method, attempt, max_attempts,
                error = %r.error, "attempt failed"
            );
            last = Some(r);

            if attempt == max_attempts || current.is_fatal() || !current.should_retry() {
                classified = Some(current);
                break;
            }
            current.consume_retry();
            retries += 1;
            classified = Some(current);
            tokio::time::sleep(backoff_delay(&self.config, attempt, fastrand::f64)).await;
        }

        let chain = self.fallback_chain(action, method, classified.as_ref().map(|c| c.error_class));
        if !chain.is_empty() {
            tracing::info!(step_id = %step.step_id, action, ?chain, "trying fallback methods");
        }
        for fb in chain {
            if self.is_demoted(action, fb) {
                tracing::debug!(action, method = %fb, "skipping demoted method");
                continue;
            }
            if !runner.can_run(fb) {
                continue;
            }
            attempts += 1;
            let r = runner.run_attempt(&step.with_method(fb)).await.with_attempt(attempts);
            note_method(&mut methods_tried, r.method);
            if r.success {
                tracing::info!(action, method = %r.method, "fallback succeeded");
                return done(r, None, attempts, retries, methods_tried);
            }
            self.record_failure(action, r.method);
            classified = Some(self.classifier.classify_result(&r));
            last = Some(r);
            tokio::time::sleep(self.config.fallback_pause).await;
        }

        let fatal = classified.as_ref().map(|c| c.is_fatal()).unwrap_or(false);
        if is_single_method(action) && !fatal {
            tracing::info!(action, "last-resort attempt via system");
            attempts += 1;
            let r = runner
                .run_attempt(&step.with_method(Method::System))
                .await
                .with_attempt(attempts);
            note_method(&mut methods_tried, r.method);
            if r.success {
                return done(r, None, attempts, retries, methods_tried);
            }
            self.record_failure(action, r.method);
            classified = Some(self.classifier.classify_result(&r));
            last = Some(r);
        }

        let result = last.unwrap_or_else(|| {
            ActionResult::fail(
                action,
                &step.value,
                step.method,
                "no attempt was made",
                ErrorClass::Unknown,
            )
        });
        let classified = classified.unwrap_or_else(|| self.classifier.classify_result(&result));
        tracing::error!(step_id = %step.step_id, action, attempts, "all retries and fallbacks exhausted");
        done(result, Some(classified), attempts, retries, methods_tried)
    }
}

fn note_method(tried: &mut Vec<Method>, m: Method) {
    if !tried.contains(&m) {
        tried.push(m);
    }
}

fn done(
    result: ActionResult,
    classified: Option<ClassifiedError>,
    attempts: u32,
    retries: u32,
    methods_tried: Vec<Method>,
) -> RetryOutcome {
    RetryOutcome {
        result,
        classified,
        attempts,
        retries,
        methods_tried,
    }
}
