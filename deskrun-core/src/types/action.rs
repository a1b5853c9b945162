use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::Metadata;
use super::method::Method;

/// Closed failure taxonomy shared by every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    ElementNotFound,
    WindowNotOpen,
    Timeout,
    ProcessDead,
    PermissionDenied,
    BrowserCrash,
    NetworkError,
    SchemaInvalid,
    AccessibilityFail,
    CvNoMatch,
    CommandFailed,
    Unknown,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::ElementNotFound => "element_not_found",
            ErrorClass::WindowNotOpen => "window_not_open",
            ErrorClass::Timeout => "timeout",
            ErrorClass::ProcessDead => "process_dead",
            ErrorClass::PermissionDenied => "permission_denied",
            ErrorClass::BrowserCrash => "browser_crash",
            ErrorClass::NetworkError => "network_error",
            ErrorClass::SchemaInvalid => "schema_invalid",
            ErrorClass::AccessibilityFail => "accessibility_fail",
            ErrorClass::CvNoMatch => "cv_no_match",
            ErrorClass::CommandFailed => "command_failed",
            ErrorClass::Unknown => "unknown",
        }
    }

    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            ErrorClass::ElementNotFound => RecoveryStrategy::SwitchMethod,
            ErrorClass::WindowNotOpen => RecoveryStrategy::ReopenApp,
            ErrorClass::Timeout => RecoveryStrategy::RetryWithLongerWait,
            ErrorClass::ProcessDead => RecoveryStrategy::RelaunchProcess,
            ErrorClass::PermissionDenied => RecoveryStrategy::SkipOrEscalate,
            ErrorClass::BrowserCrash => RecoveryStrategy::RestartBrowser,
            ErrorClass::NetworkError => RecoveryStrategy::RetryWithBackoff,
            ErrorClass::SchemaInvalid => RecoveryStrategy::Replan,
            ErrorClass::AccessibilityFail => RecoveryStrategy::SwitchToCv,
            ErrorClass::CvNoMatch => RecoveryStrategy::SwitchToOcr,
            ErrorClass::CommandFailed => RecoveryStrategy::AlternativeCommand,
            ErrorClass::Unknown => RecoveryStrategy::FullReset,
        }
    }

    /// Retries allowed after the first failure of this class.
    pub fn retry_budget(&self) -> u32 {
        match self {
            ErrorClass::ElementNotFound => 3,
            ErrorClass::WindowNotOpen => 2,
            ErrorClass::Timeout => 3,
            ErrorClass::ProcessDead => 1,
            ErrorClass::PermissionDenied => 0,
            ErrorClass::BrowserCrash => 1,
            ErrorClass::NetworkError => 4,
            ErrorClass::SchemaInvalid => 1,
            ErrorClass::AccessibilityFail => 2,
            ErrorClass::CvNoMatch => 2,
            ErrorClass::CommandFailed => 2,
            ErrorClass::Unknown => 1,
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorClass::PermissionDenied | ErrorClass::SchemaInvalid)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    SwitchMethod,
    ReopenApp,
    RetryWithLongerWait,
    RelaunchProcess,
    SkipOrEscalate,
    RestartBrowser,
    RetryWithBackoff,
    Replan,
    SwitchToCv,
    SwitchToOcr,
    AlternativeCommand,
    FullReset,
}

impl RecoveryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStrategy::SwitchMethod => "switch_method",
            RecoveryStrategy::ReopenApp => "reopen_app",
            RecoveryStrategy::RetryWithLongerWait => "retry_with_longer_wait",
            RecoveryStrategy::RelaunchProcess => "relaunch_process",
            RecoveryStrategy::SkipOrEscalate => "skip_or_escalate",
            RecoveryStrategy::RestartBrowser => "restart_browser",
            RecoveryStrategy::RetryWithBackoff => "retry_with_backoff",
            RecoveryStrategy::Replan => "replan",
            RecoveryStrategy::SwitchToCv => "switch_to_cv",
            RecoveryStrategy::SwitchToOcr => "switch_to_ocr",
            RecoveryStrategy::AlternativeCommand => "alternative_command",
            RecoveryStrategy::FullReset => "full_reset",
        }
    }
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of executing one step once.
///
/// A failed result always carries an error class; use [`ActionResult::fail`] or
/// [`ActionResult::from_bool`] rather than building one by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub action: String,
    pub value: String,
    pub method: Method,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_hint: Option<RecoveryStrategy>,
    pub execution_time_ms: u64,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
}

impl ActionResult {
    pub fn ok(action: impl Into<String>, value: impl Into<String>, method: Method) -> Self {
        Self {
            success: true,
            action: action.into(),
            value: value.into(),
            method,
            error: String::new(),
            error_code: None,
            recovery_hint: None,
            execution_time_ms: 0,
            metadata: Metadata::new(),
            attempt: 1,
            timestamp: Utc::now(),
        }
    }

    pub fn fail(
        action: impl Into<String>,
        value: impl Into<String>,
        method: Method,
        error: impl Into<String>,
        code: ErrorClass,
    ) -> Self {
        let error = error.into();
        Self {
            success: false,
            action: action.into(),
            value: value.into(),
            method,
            error: if error.is_empty() {
                "unspecified failure".to_string()
            } else {
                error
            },
            error_code: Some(code),
            recovery_hint: Some(code.recovery_strategy()),
            execution_time_ms: 0,
            metadata: Metadata::new(),
            attempt: 1,
            timestamp: Utc::now(),
        }
    }

    /// Wraps a plain boolean backend reply.
    pub fn from_bool(ok: bool, action: &str, value: &str, method: Method) -> Self {
        if ok {
            Self::ok(action, value, method)
        } else {
            Self::fail(
                action,
                value,
                method,
                format!("{action} returned false"),
                ErrorClass::Unknown,
            )
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self.error_code {
            Some(code) => !self.success && code.is_retryable(),
            None => !self.success,
        }
    }

    pub fn error_class(&self) -> Option<ErrorClass> {
        if self.success {
            None
        } else {
            Some(self.error_code.unwrap_or(ErrorClass::Unknown))
        }
    }

    /// Re-tag a failure with a more specific class. No-op on success.
    pub fn reclassify(mut self, code: ErrorClass) -> Self {
        if !self.success {
            self.error_code = Some(code);
            self.recovery_hint = Some(code.recovery_strategy());
        }
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.execution_time_ms = elapsed.as_millis() as u64;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.success {
            write!(
                f,
                "OK {}('{}') via {} in {}ms",
                self.action, self.value, self.method, self.execution_time_ms
            )
        } else {
            write!(
                f,
                "FAIL {}('{}') via {}: {} [{}]",
                self.action,
                self.value,
                self.method,
                self.error,
                self.error_class().unwrap_or(ErrorClass::Unknown)
            )
        }
    }
}
