//! Mutable state shared across the steps of one run.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use deskrun_core::Method;
use serde::{Deserialize, Serialize};

/// Actions SAFE_MODE lets through. All are read-only or trivially reversible.
pub const SAFE_MODE_ALLOWED: &[&str] = &[
    "verify_window",
    "focus_window",
    "get_text",
    "wait_for_element",
    "scroll",
    "set_volume",
    "set_brightness",
];

const SNAPSHOT_HISTORY: usize = 5;
const MAX_HISTORY: usize = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    #[default]
    Live,
    DryRun,
    SafeMode,
}

impl ExecMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecMode::Live => "live",
            ExecMode::DryRun => "dry_run",
            ExecMode::SafeMode => "safe_mode",
        }
    }
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(ExecMode::Live),
            "dry_run" | "dry-run" | "dry" => Ok(ExecMode::DryRun),
            "safe" | "safe_mode" | "safe-mode" => Ok(ExecMode::SafeMode),
            other => Err(format!("unknown execution mode '{other}'")),
        }
    }
}

/// What the mode gate says about one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecGate {
    Allowed,
    /// DRY_RUN: record the intent, call nothing.
    Simulated,
    Blocked(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DryRunIntent {
    pub step_id: String,
    pub action: String,
    pub value: String,
    pub method: Method,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub step_id: String,
    pub action: String,
    pub value: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<Method>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSnapshot {
    pub mode: ExecMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_app: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_window: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success_method: Option<Method>,
    pub retry_count: u32,
    pub system_load: f64,
    pub steps_recorded: usize,
    pub blocked: usize,
    pub recent: Vec<StepRecord>,
}

#[derive(Debug, Default)]
struct Inner {
    active_app: Option<String>,
    active_window: Option<String>,
    last_success_method: Option<Method>,
    retry_count: u32,
    system_load: f64,
    history: VecDeque<StepRecord>,
    dry_run: Vec<DryRunIntent>,
    blocked: Vec<(String, String)>,
}

/// Per-run context. Every access goes through the internal lock.
#[derive(Debug)]
pub struct ExecutionContext {
    mode: ExecMode,
    inner: Mutex<Inner>,
}

impl ExecutionContext {
    pub fn new(mode: ExecMode) -> Self {
        Self {
            mode,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock still holds consistent plain data.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn can_execute(&self, action: &str) -> ExecGate {
        match self.mode {
            ExecMode::Live => ExecGate::Allowed,
            ExecMode::DryRun => ExecGate::Simulated,
            ExecMode::SafeMode if SAFE_MODE_ALLOWED.contains(&action) => ExecGate::Allowed,
            ExecMode::SafeMode => {
                ExecGate::Blocked(format!("blocked: '{action}' not allowed in SAFE_MODE"))
            }
        }
    }

    pub fn record_blocked(&self, step_id: &str, reason: &str) {
        self.lock()
            .blocked
            .push((step_id.to_string(), reason.to_string()));
    }

    pub fn blocked_count(&self) -> usize {
        self.lock().blocked.len()
    }

    pub fn record_dry_run(&self, intent: DryRunIntent) {
        tracing::info!(
            step_id = %intent.step_id, action = %intent.action, value = %intent.value,
            method = %intent.method, "dry run: would execute"
        );
        self.lock().dry_run.push(intent);
    }

    pub fn dry_run_intents(&self) -> Vec<DryRunIntent> {
        self.lock().dry_run.clone()
    }

    pub fn record_step_start(&self, step_id: &str, action: &str, value: &str) {
        let mut inner = self.lock();
        if inner.history.len() >= MAX_HISTORY {
            inner.history.pop_front();
        }
        inner.history.push_back(StepRecord {
            step_id: step_id.to_string(),
            action: action.to_string(),
            value: value.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            success: None,
            method: None,
            error: None,
        });
    }

    /// Closes the most recent open record for `step_id`.
    pub fn record_step_end(&self, step_id: &str, success: bool, method: Method, error: Option<&str>) {
        let mut inner = self.lock();
        let mut action = None;
        if let Some(rec) = inner
            .history
            .iter_mut()
            .rev()
            .find(|r| r.step_id == step_id && r.finished_at.is_none())
        {
            rec.finished_at = Some(Utc::now());
            rec.success = Some(success);
            rec.method = Some(method);
            rec.error = error.map(str::to_string);
            action = Some((rec.action.clone(), rec.value.clone()));
        }

        if success {
            inner.retry_count = 0;
            inner.last_success_method = Some(method);
            match action {
                Some((a, v)) if a == "open_app" => inner.active_app = Some(v),
                Some((a, v)) if a == "focus_window" => inner.active_window = Some(v),
                _ => {}
            }
        }
    }

    pub fn increment_retry(&self) -> u32 {
        let mut inner = self.lock();
        inner.retry_count += 1;
        inner.retry_count
    }

    pub fn retry_count(&self) -> u32 {
        self.lock().retry_count
    }

    pub fn active_app(&self) -> Option<String> {
        self.lock().active_app.clone()
    }

    pub fn set_active_app(&self, app: impl Into<String>) {
        self.lock().active_app = Some(app.into());
    }

    pub fn active_window(&self) -> Option<String> {
        self.lock().active_window.clone()
    }

    pub fn set_active_window(&self, window: impl Into<String>) {
        self.lock().active_window = Some(window.into());
    }

    pub fn last_success_method(&self) -> Option<Method> {
        self.lock().last_success_method
    }

    pub fn set_system_load(&self, score: f64) {
        self.lock().system_load = score.clamp(0.0, 1.0);
    }

    pub fn system_load(&self) -> f64 {
        self.lock().system_load
    }

    pub fn history(&self) -> Vec<StepRecord> {
        self.lock().history.iter().cloned().collect()
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        let inner = self.lock();
        let skip = inner.history.len().saturating_sub(SNAPSHOT_HISTORY);
        ContextSnapshot {
            mode: self.mode,
            active_app: inner.active_app.clone(),
            active_window: inner.active_window.clone(),
            last_success_method: inner.last_success_method,
            retry_count: inner.retry_count,
            system_load: inner.system_load,
            steps_recorded: inner.history.len(),
            blocked: inner.blocked.len(),
            recent: inner.history.iter().skip(skip).cloned().collect(),
        }
    }
}
