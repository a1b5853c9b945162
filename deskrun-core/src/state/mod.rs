use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::IllegalTransitionError;

const MAX_HISTORY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Init,
    Planned,
    Executing,
    Verifying,
    Recovering,
    Success,
    Failed,
    Cancelled,
}

impl TaskState {
    /// The adjacency table. Nothing else decides whether a transition is legal.
    pub fn allowed_targets(&self) -> &'static [TaskState] {
        use TaskState::*;
        match self {
            Init => &[Planned, Cancelled],
            Planned => &[Executing, Failed, Cancelled],
            Executing => &[Verifying, Recovering, Failed],
            Verifying => &[Executing, Recovering, Success, Failed],
            Recovering => &[Executing, Verifying, Planned, Failed],
            Success | Failed | Cancelled => &[Init],
        }
    }

    pub fn can_transition_to(&self, to: TaskState) -> bool {
        self.allowed_targets().contains(&to)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Success | TaskState::Failed | TaskState::Cancelled
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TaskState::Executing | TaskState::Verifying | TaskState::Recovering
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Init => "INIT",
            TaskState::Planned => "PLANNED",
            TaskState::Executing => "EXECUTING",
            TaskState::Verifying => "VERIFYING",
            TaskState::Recovering => "RECOVERING",
            TaskState::Success => "SUCCESS",
            TaskState::Failed => "FAILED",
            TaskState::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionRecord {
    pub from: TaskState,
    pub to: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    pub forced: bool,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MachineStatus {
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<TaskState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    pub elapsed_ms: u64,
    pub transitions: usize,
}

#[derive(Debug)]
struct Inner {
    state: TaskState,
    previous: Option<TaskState>,
    current_step: Option<String>,
    started_at: Option<DateTime<Utc>>,
    history: Vec<TransitionRecord>,
}

impl Inner {
    fn record(&mut self, rec: TransitionRecord) {
        if self.history.len() >= MAX_HISTORY {
            self.history.remove(0);
        }
        self.history.push(rec);
    }
}

/// Lifecycle of a single task, serialized by an async lock.
#[derive(Debug)]
pub struct TaskStateMachine {
    inner: Mutex<Inner>,
}

impl Default for TaskStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStateMachine {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: TaskState::Init,
                previous: None,
                current_step: None,
                started_at: None,
                history: Vec::new(),
            }),
        }
    }

    pub async fn transition(&self, to: TaskState) -> Result<(), IllegalTransitionError> {
        self.transition_at(to, None).await
    }

    /// Like [`transition`](Self::transition), recording the step label (`"n/total:action"`).
    pub async fn transition_at(
        &self,
        to: TaskState,
        step: Option<String>,
    ) -> Result<(), IllegalTransitionError> {
        self.apply(None, to, step).await
    }

    /// Transitions only when the machine is currently in `expected`.
    ///
    /// Checking and applying happen under one lock acquisition, so two callers racing to
    /// leave the same state cannot both succeed.
    pub async fn transition_from(
        &self,
        expected: TaskState,
        to: TaskState,
    ) -> Result<(), IllegalTransitionError> {
        self.apply(Some(expected), to, None).await
    }

    async fn apply(
        &self,
        expected: Option<TaskState>,
        to: TaskState,
        step: Option<String>,
    ) -> Result<(), IllegalTransitionError> {
        let mut inner = self.inner.lock().await;
        let from = inner.state;
        if expected.is_some_and(|e| e != from) || !from.can_transition_to(to) {
            return Err(IllegalTransitionError { from, to });
        }

        if from == TaskState::Init && to == TaskState::Planned {
            inner.started_at = Some(Utc::now());
            inner.current_step = None;
        }
        if step.is_some() {
            inner.current_step = step.clone();
        }
        inner.record(TransitionRecord {
            from,
            to,
            step,
            forced: false,
            at: Utc::now(),
        });
        inner.previous = Some(from);
        inner.state = to;
        tracing::debug!(%from, %to, "task state transition");
        Ok(())
    }

    /// Moves straight back to INIT without consulting the table.
    pub async fn force_reset(&self) {
        let mut inner = self.inner.lock().await;
        let from = inner.state;
        if from != TaskState::Init {
            tracing::warn!(%from, "task state force-reset to INIT");
        }
        inner.record(TransitionRecord {
            from,
            to: TaskState::Init,
            step: None,
            forced: true,
            at: Utc::now(),
        });
        inner.previous = Some(from);
        inner.state = TaskState::Init;
        inner.current_step = None;
        inner.started_at = None;
    }

    pub async fn current(&self) -> TaskState {
        self.inner.lock().await.state
    }

    pub async fn is_terminal(&self) -> bool {
        self.current().await.is_terminal()
    }

    pub async fn is_active(&self) -> bool {
        self.current().await.is_active()
    }

    pub async fn elapsed(&self) -> Duration {
        let inner = self.inner.lock().await;
        inner
            .started_at
            .and_then(|t| (Utc::now() - t).to_std().ok())
            .unwrap_or_default()
    }

    pub async fn history(&self) -> Vec<TransitionRecord> {
        self.inner.lock().await.history.clone()
    }

    pub async fn status(&self) -> MachineStatus {
        let inner = self.inner.lock().await;
        MachineStatus {
            state: inner.state,
            previous: inner.previous,
            current_step: inner.current_step.clone(),
            elapsed_ms: inner
                .started_at
                .and_then(|t| (Utc::now() - t).to_std().ok())
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
            transitions: inner.history.len(),
        }
    }
}
