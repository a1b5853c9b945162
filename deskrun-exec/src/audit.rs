use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deskrun_store::{AuditEntry, AuditLog, AuditStore, CrashDump, RunOutcome, StoreError};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::events::{Event, EventSink};

/// How many trailing events a crash dump highlights.
pub const CRASH_TAIL: usize = 10;

/// Characters of the task name kept in a task id; audit file names must stay short.
pub const TASK_ID_NAME_CHARS: usize = 64;

/// A successful step as recorded in the trail, for replaying a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayStep {
    pub step_id: String,
    pub method: String,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditReport {
    pub log_location: Option<String>,
    pub crash_dump: Option<String>,
}

/// Buffers one run's events and persists them when the run ends.
pub struct ExecutionAudit {
    task_id: String,
    task_name: String,
    run_id: Uuid,
    started: Instant,
    started_at: DateTime<Utc>,
    entries: Mutex<Vec<AuditEntry>>,
    store: Option<Arc<dyn AuditStore>>,
}

impl ExecutionAudit {
    pub fn new(task_name: &str, run_id: Uuid, store: Option<Arc<dyn AuditStore>>) -> Self {
        let started_at = Utc::now();
        let short = run_id.simple().to_string();
        let name: String = task_name.chars().take(TASK_ID_NAME_CHARS).collect();
        Self {
            task_id: format!("{}_{}_{}", name, started_at.timestamp(), &short[..8]),
            task_name: task_name.to_string(),
            run_id,
            started: Instant::now(),
            started_at,
            entries: Mutex::new(Vec::new()),
            store,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub async fn record(&self, event: &Event) {
        let mut payload = event.to_json();
        if let Some(obj) = payload.as_object_mut() {
            obj.remove("type");
            obj.remove("run_id");
        }
        let entry = AuditEntry {
            offset_ms: self.started.elapsed().as_millis() as u64,
            event: event.name().to_string(),
            payload,
        };
        self.entries.lock().await.push(entry);
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn replay_steps(&self) -> Vec<ReplayStep> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|e| e.event == "step.succeeded")
            .map(|e| ReplayStep {
                step_id: str_field(&e.payload, "step_id"),
                method: str_field(&e.payload, "method"),
                elapsed_ms: e.payload.get("elapsed_ms").and_then(|v| v.as_u64()).unwrap_or(0),
            })
            .collect()
    }

    /// Writes the run log and, on failure, a crash dump. Store errors are returned but the
    /// buffered trail is kept so a caller can retry.
    pub async fn finish(
        &self,
        success: bool,
        error: Option<&str>,
        context: serde_json::Value,
    ) -> Result<AuditReport, StoreError> {
        let Some(store) = self.store.as_ref() else {
            return Ok(AuditReport::default());
        };
        let events = self.entries().await;
        let log = AuditLog {
            task_id: self.task_id.clone(),
            task_name: self.task_name.clone(),
            run_id: self.run_id,
            outcome: RunOutcome::from_success(success),
            started_at: self.started_at,
            saved_at: Utc::now(),
            events: events.clone(),
        };
        let log_location = store.save_log(&log).await?;
        tracing::debug!(location = %log_location, "audit log saved");

        let mut report = AuditReport {
            log_location: Some(log_location),
            crash_dump: None,
        };
        if !success {
            let tail = events.len().saturating_sub(CRASH_TAIL);
            let dump = CrashDump {
                task_id: self.task_id.clone(),
                task_name: self.task_name.clone(),
                run_id: self.run_id,
                crashed_at: Utc::now(),
                error: error.unwrap_or("unknown failure").to_string(),
                context,
                event_count: events.len(),
                last_events: events[tail..].to_vec(),
                full_log: events,
            };
            let location = store.save_crash_dump(&dump).await?;
            tracing::warn!(location = %location, "crash dump written");
            report.crash_dump = Some(location);
        }
        Ok(report)
    }
}

fn str_field(v: &serde_json::Value, key: &str) -> String {
    v.get(key).and_then(|s| s.as_str()).unwrap_or_default().to_string()
}

#[async_trait]
impl EventSink for ExecutionAudit {
    async fn emit(&self, event: Event) {
        self.record(&event).await;
    }
}
