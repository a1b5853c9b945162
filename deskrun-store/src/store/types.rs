use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Ok,
    Fail,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Ok => "ok",
            RunOutcome::Fail => "fail",
        }
    }

    pub fn from_success(success: bool) -> Self {
        if success {
            RunOutcome::Ok
        } else {
            RunOutcome::Fail
        }
    }
}

/// One event in a run's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Milliseconds since the run started.
    pub offset_ms: u64,
    pub event: String,
    pub payload: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub task_id: String,
    pub task_name: String,
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
    pub events: Vec<AuditEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashDump {
    pub task_id: String,
    pub task_name: String,
    pub run_id: Uuid,
    pub crashed_at: DateTime<Utc>,
    pub error: String,
    pub context: JsonValue,
    pub event_count: usize,
    pub last_events: Vec<AuditEntry>,
    pub full_log: Vec<AuditEntry>,
}
