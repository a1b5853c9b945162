use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Method;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
    RolledBack,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
            StepStatus::RolledBack => "rolled_back",
        }
    }
}

/// One executable unit plus its runtime status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepNode {
    pub id: String,
    pub seq: usize,
    pub action: String,
    pub value: String,
    pub method: Method,
    pub depends_on: Vec<String>,
    pub timeout_ms: u64,
    pub max_retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_action: Option<String>,

    pub status: StepStatus,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_used: Option<Method>,
}

impl StepNode {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns `false` when the node is already SUCCESS and nothing changed.
    pub fn mark_running(&mut self) -> bool {
        if self.status == StepStatus::Success {
            return false;
        }
        self.status = StepStatus::Running;
        self.attempts += 1;
        self.started_at = Some(Utc::now());
        true
    }

    pub fn mark_success(&mut self, method_used: Method) {
        self.status = StepStatus::Success;
        self.method_used = Some(method_used);
        self.error = None;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_skipped(&mut self, reason: impl Into<String>) {
        self.status = StepStatus::Skipped;
        self.error = Some(reason.into());
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_rolled_back(&mut self) {
        if self.status == StepStatus::Success {
            self.status = StepStatus::RolledBack;
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.status, StepStatus::Success | StepStatus::Skipped)
    }

    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_retries
    }

    pub fn reset(&mut self) {
        self.status = StepStatus::Pending;
        self.attempts = 0;
        self.error = None;
        self.started_at = None;
        self.finished_at = None;
        self.method_used = None;
    }

    pub fn duration(&self) -> Option<Duration> {
        let (start, end) = (self.started_at?, self.finished_at?);
        (end - start).to_std().ok()
    }

    pub fn label(&self, total: usize) -> String {
        format!("{}/{}:{}", self.seq, total, self.action)
    }
}
