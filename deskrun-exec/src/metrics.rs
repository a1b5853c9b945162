use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::events::{Event, EventSink};

#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    pub run_id: Option<uuid::Uuid>,
    pub task: String,
    pub status: String,
    pub started_at: Option<Instant>,
    pub total_duration: Option<Duration>,
    pub steps_succeeded: usize,
    pub steps_failed: usize,
    pub steps_skipped: usize,
    pub steps_retried: usize,
    pub recoveries: usize,
    pub recoveries_succeeded: usize,
    pub rollbacks: usize,
    pub rollbacks_failed: usize,
    pub watchdog_alerts: usize,
}

impl RunMetrics {
    pub fn start(&mut self, run_id: uuid::Uuid, task: &str) {
        *self = Self {
            run_id: Some(run_id),
            task: task.to_string(),
            status: "running".to_string(),
            started_at: Some(Instant::now()),
            ..Default::default()
        };
    }

    pub fn finish(&mut self, success: bool) {
        self.status = if success { "success" } else { "failed" }.to_string();
        self.total_duration = self.started_at.map(|s| s.elapsed());
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "run_id": self.run_id.map(|r| r.to_string()),
            "task": self.task,
            "status": self.status,
            "duration_ms": self.total_duration.map(|d| d.as_millis() as u64),
            "steps": {
                "succeeded": self.steps_succeeded,
                "failed": self.steps_failed,
                "skipped": self.steps_skipped,
                "retried": self.steps_retried,
            },
            "recoveries": {
                "started": self.recoveries,
                "succeeded": self.recoveries_succeeded,
            },
            "rollbacks": {
                "executed": self.rollbacks,
                "failed": self.rollbacks_failed,
            },
            "watchdog_alerts": self.watchdog_alerts,
        })
    }
}

#[derive(Default)]
pub struct MetricsCollector {
    metrics: Mutex<RunMetrics>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn observe(&self, event: &Event) {
        let mut m = self.metrics.lock().await;
        match event {
            Event::TaskStarted { run_id, task, .. } => m.start(*run_id, task),
            Event::TaskFinished { success, .. } => m.finish(*success),
            Event::StepSucceeded { .. } => m.steps_succeeded += 1,
            Event::StepFailed { .. } => m.steps_failed += 1,
            Event::StepSkipped { .. } => m.steps_skipped += 1,
            Event::StepRetried { .. } => m.steps_retried += 1,
            Event::RecoveryStarted { .. } => m.recoveries += 1,
            Event::RecoveryFinished { success: true, .. } => m.recoveries_succeeded += 1,
            Event::RollbackExecuted { success, .. } => {
                m.rollbacks += 1;
                if !success {
                    m.rollbacks_failed += 1;
                }
            }
            Event::WatchdogAlert { .. } => m.watchdog_alerts += 1,
            _ => {}
        }
    }

    pub async fn get_metrics(&self) -> RunMetrics {
        self.metrics.lock().await.clone()
    }
}

/// Counts events into a [`MetricsCollector`] and forwards them unchanged.
pub struct MetricsEventSink {
    collector: Arc<MetricsCollector>,
    base: Arc<dyn EventSink>,
}

impl MetricsEventSink {
    pub fn new(collector: Arc<MetricsCollector>, base: Arc<dyn EventSink>) -> Self {
        Self { collector, base }
    }
}

#[async_trait]
impl EventSink for MetricsEventSink {
    async fn emit(&self, event: Event) {
        self.collector.observe(&event).await;
        self.base.emit(event).await;
    }
}
