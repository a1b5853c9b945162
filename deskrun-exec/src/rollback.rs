//! LIFO stack of compensating actions for completed steps.

use std::sync::Arc;
use std::time::Duration;

use deskrun_core::{ErrorClass, Method, StepGraph, StepNode};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::executor::{AttemptRunner, BackendRegistry, StepExecutor, StepRequest};

pub const DEFAULT_ROLLBACK_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackEntry {
    pub action: String,
    pub value: String,
    pub method: Method,
    pub source_step: String,
    pub source_seq: usize,
}

/// Per-entry result, in the order the compensations ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollbackOutcome {
    pub action: String,
    pub value: String,
    pub source_step: String,
    pub method: Method,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct RollbackManager {
    executor: StepExecutor,
    timeout: Duration,
    stack: Mutex<Vec<RollbackEntry>>,
}

impl RollbackManager {
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self {
            executor: StepExecutor::new(registry),
            timeout: DEFAULT_ROLLBACK_TIMEOUT,
            stack: Mutex::new(Vec::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Registers the compensation for a node that just succeeded.
    ///
    /// Returns `false` when the node has no compensating action.
    pub async fn push(&self, node: &StepNode) -> bool {
        let Some(action) = node.rollback_action.as_deref().filter(|a| !a.trim().is_empty()) else {
            return false;
        };
        let entry = RollbackEntry {
            action: action.to_string(),
            value: node.value.clone(),
            method: Method::Auto,
            source_step: node.id.clone(),
            source_seq: node.seq,
        };
        tracing::debug!(action, source = %node.id, "rollback registered");
        self.stack.lock().await.push(entry);
        true
    }

    pub async fn len(&self) -> usize {
        self.stack.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.stack.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        self.stack.lock().await.clear();
    }

    pub async fn entries(&self) -> Vec<RollbackEntry> {
        self.stack.lock().await.clone()
    }

    /// Runs every registered compensation in reverse completion order and empties the stack.
    ///
    /// A failing compensation is recorded and the rest still run.
    pub async fn rollback_all(&self) -> Vec<RollbackOutcome> {
        let entries = std::mem::take(&mut *self.stack.lock().await);
        if entries.is_empty() {
            return Vec::new();
        }
        tracing::info!(count = entries.len(), "rolling back completed steps");
        self.run_reversed(entries).await
    }

    /// Compensates only the steps that ran after `failed_id` (by plan sequence).
    ///
    /// Entries at or before the failure point stay on the stack.
    pub async fn rollback_from(&self, failed_id: &str, graph: &StepGraph) -> Vec<RollbackOutcome> {
        let Some(failed) = graph.get(failed_id) else {
            tracing::warn!(failed_id, "rollback_from: unknown step");
            return Vec::new();
        };
        let pivot = failed.seq;
        let selected = {
            let mut stack = self.stack.lock().await;
            let (after, keep): (Vec<_>, Vec<_>) =
                stack.drain(..).partition(|e| e.source_seq > pivot);
            *stack = keep;
            after
        };
        self.run_reversed(selected).await
    }

    async fn run_reversed(&self, entries: Vec<RollbackEntry>) -> Vec<RollbackOutcome> {
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries.into_iter().rev() {
            out.push(self.run_one(entry).await);
        }
        out
    }

    async fn run_one(&self, entry: RollbackEntry) -> RollbackOutcome {
        let method = self
            .executor
            .registry()
            .rollback_method(&entry.action)
            .unwrap_or(entry.method);
        let mut request = StepRequest::new(&entry.action, &entry.value, method).with_timeout(self.timeout);
        request.step_id = format!("rollback:{}", entry.source_step);

        let result = self.executor.run_attempt(&request).await;
        let error = if result.success {
            None
        } else {
            let class = result.error_class().unwrap_or(ErrorClass::Unknown);
            tracing::warn!(
                action = %entry.action, source = %entry.source_step, %class,
                error = %result.error, "rollback step failed"
            );
            Some(result.error.clone())
        };
        RollbackOutcome {
            action: entry.action,
            value: entry.value,
            source_step: entry.source_step,
            method: result.method,
            success: result.success,
            error,
        }
    }
}
