use std::time::Duration;

use async_trait::async_trait;
use deskrun_core::graph::budgets;
use deskrun_core::{ActionResult, Method, StepNode};

/// What a backend is asked to do for one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRequest {
    pub step_id: String,
    pub action: String,
    pub value: String,
    pub method: Method,
    pub timeout: Duration,
    /// Attempts allowed against the primary method.
    pub max_attempts: u32,
}

impl StepRequest {
    pub fn new(action: impl Into<String>, value: impl Into<String>, method: Method) -> Self {
        let action = action.into();
        Self {
            step_id: String::new(),
            timeout: budgets::action_timeout(&action),
            max_attempts: budgets::action_max_retries(&action),
            action,
            value: value.into(),
            method,
        }
    }

    pub fn from_node(node: &StepNode) -> Self {
        Self {
            step_id: node.id.clone(),
            action: node.action.clone(),
            value: node.value.clone(),
            method: node.method,
            timeout: node.timeout(),
            max_attempts: node.max_retries.max(1),
        }
    }

    pub fn with_method(&self, method: Method) -> Self {
        Self {
            method,
            ..self.clone()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A backend may answer with a bare flag or a full result.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendReply {
    Done(bool),
    Detailed(ActionResult),
}

impl From<bool> for BackendReply {
    fn from(ok: bool) -> Self {
        BackendReply::Done(ok)
    }
}

impl From<ActionResult> for BackendReply {
    fn from(r: ActionResult) -> Self {
        BackendReply::Detailed(r)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("{0}")]
    Failed(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// One concrete way of performing actions (accessibility tree, browser driver, shell, CV).
#[async_trait]
pub trait ActionBackend: Send + Sync {
    fn method(&self) -> Method;

    fn is_available(&self) -> bool {
        true
    }

    async fn execute(&self, step: &StepRequest) -> Result<BackendReply, BackendError>;

    /// Kill or restart hung helper processes owned by this backend.
    async fn reset(&self) -> Result<(), BackendError> {
        Ok(())
    }
}
