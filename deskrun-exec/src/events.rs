use std::sync::Arc;

use async_trait::async_trait;
use deskrun_core::{ErrorClass, Method, RecoveryStrategy};
use serde::Serialize;
use uuid::Uuid;

use crate::context::{ContextSnapshot, ExecMode};
use crate::watchdog::AlertKind;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "task.started")]
    TaskStarted {
        run_id: Uuid,
        task: String,
        mode: ExecMode,
        steps: usize,
    },
    #[serde(rename = "task.finished")]
    TaskFinished {
        run_id: Uuid,
        success: bool,
        steps_done: usize,
        steps_total: usize,
        duration_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename = "step.started")]
    StepStarted {
        run_id: Uuid,
        step_id: String,
        label: String,
        action: String,
        value: String,
        method: Method,
    },
    #[serde(rename = "step.succeeded")]
    StepSucceeded {
        run_id: Uuid,
        step_id: String,
        method: Method,
        attempts: u32,
        elapsed_ms: u64,
    },
    #[serde(rename = "step.failed")]
    StepFailed {
        run_id: Uuid,
        step_id: String,
        error: String,
        error_class: ErrorClass,
    },
    #[serde(rename = "step.skipped")]
    StepSkipped {
        run_id: Uuid,
        step_id: String,
        reason: String,
    },
    #[serde(rename = "step.retried")]
    StepRetried {
        run_id: Uuid,
        step_id: String,
        attempts: u32,
        retries: u32,
        methods_tried: Vec<Method>,
    },
    #[serde(rename = "step.dry_run")]
    DryRunIntent {
        run_id: Uuid,
        step_id: String,
        action: String,
        value: String,
        method: Method,
    },
    #[serde(rename = "recovery.started")]
    RecoveryStarted {
        run_id: Uuid,
        step_id: String,
        strategy: RecoveryStrategy,
    },
    #[serde(rename = "recovery.finished")]
    RecoveryFinished {
        run_id: Uuid,
        step_id: String,
        strategy: RecoveryStrategy,
        success: bool,
    },
    #[serde(rename = "verify.failed")]
    VerifyFailed {
        run_id: Uuid,
        step_id: String,
        action: String,
    },
    #[serde(rename = "rollback.executed")]
    RollbackExecuted {
        run_id: Uuid,
        source_step: String,
        action: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename = "watchdog.alert")]
    WatchdogAlert {
        run_id: Uuid,
        kind: AlertKind,
        message: String,
    },
    #[serde(rename = "context.snapshot")]
    ContextSnapshot {
        run_id: Uuid,
        snapshot: ContextSnapshot,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::TaskStarted { .. } => "task.started",
            Event::TaskFinished { .. } => "task.finished",
            Event::StepStarted { .. } => "step.started",
            Event::StepSucceeded { .. } => "step.succeeded",
            Event::StepFailed { .. } => "step.failed",
            Event::StepSkipped { .. } => "step.skipped",
            Event::StepRetried { .. } => "step.retried",
            Event::DryRunIntent { .. } => "step.dry_run",
            Event::RecoveryStarted { .. } => "recovery.started",
            Event::RecoveryFinished { .. } => "recovery.finished",
            Event::VerifyFailed { .. } => "verify.failed",
            Event::RollbackExecuted { .. } => "rollback.executed",
            Event::WatchdogAlert { .. } => "watchdog.alert",
            Event::ContextSnapshot { .. } => "context.snapshot",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: Event);
}

pub struct CompositeEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl Default for CompositeEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeEventSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.add(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl EventSink for CompositeEventSink {
    async fn emit(&self, event: Event) {
        for sink in &self.sinks {
            sink.emit(event.clone()).await;
        }
    }
}

/// One JSON object per line on stdout.
pub struct StdoutEventSink;

#[async_trait]
impl EventSink for StdoutEventSink {
    async fn emit(&self, event: Event) {
        println!("{}", serde_json::to_string(&event).unwrap_or_default());
    }
}

pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: Event) {
        let payload = event.to_json();
        match &event {
            Event::StepFailed { .. } | Event::WatchdogAlert { .. } | Event::VerifyFailed { .. } => {
                tracing::warn!(event = event.name(), %payload)
            }
            _ => tracing::info!(event = event.name(), %payload),
        }
    }
}

pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: Event) {}
}
