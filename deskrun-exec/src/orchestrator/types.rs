use std::fmt;
use std::time::Duration;

use deskrun_core::{ErrorClass, IllegalTransitionError, StepGraph, TaskState};
use deskrun_store::StoreError;
use serde::Serialize;
use uuid::Uuid;

use crate::context::{DryRunIntent, ExecMode};
use crate::rollback::RollbackOutcome;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine busy: a run is already active (state {0})")]
    Busy(TaskState),
    #[error(transparent)]
    Transition(#[from] IllegalTransitionError),
    #[error("step not found in graph: {0}")]
    UnknownStep(String),
    #[error("audit store error: {0}")]
    Store(#[from] StoreError),
}

/// Everything a caller learns about one `run()`.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub run_id: Uuid,
    pub success: bool,
    pub task_name: String,
    pub mode: ExecMode,
    /// Nodes that reached SUCCESS.
    pub steps_done: usize,
    pub steps_skipped: usize,
    pub steps_total: usize,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_class: Option<ErrorClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crash_dump: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_log: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rollbacks: Vec<RollbackOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dry_run: Vec<DryRunIntent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<StepGraph>,
}

impl TaskResult {
    /// A run refused before any state was touched.
    pub(crate) fn rejected(
        run_id: Uuid,
        task_name: &str,
        mode: ExecMode,
        error: &EngineError,
        duration: Duration,
    ) -> Self {
        Self {
            run_id,
            success: false,
            task_name: task_name.to_string(),
            mode,
            steps_done: 0,
            steps_skipped: 0,
            steps_total: 0,
            duration_ms: duration.as_millis() as u64,
            error: Some(error.to_string()),
            error_class: None,
            crash_dump: None,
            audit_log: None,
            rollbacks: Vec::new(),
            dry_run: Vec::new(),
            graph: None,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl fmt::Display for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} | {}/{} steps | {:.1}s",
            if self.success { "OK" } else { "FAILED" },
            self.task_name,
            self.steps_done,
            self.steps_total,
            self.duration_ms as f64 / 1000.0
        )?;
        if let Some(err) = &self.error {
            let short: String = err.chars().take(50).collect();
            write!(f, " | {short:?}")?;
        }
        Ok(())
    }
}
