//! Maps raw failure messages onto the closed [`ErrorClass`] taxonomy.

mod rules;

use std::fmt;

use deskrun_core::{ActionResult, ErrorClass, Method, RecoveryStrategy};
use serde::Serialize;

use rules::{BROWSER_ACTIONS, FATAL_COMMAND_RE, RULES, WINDOW_ACTIONS};

/// A failure with its class, recovery strategy and the retries it still allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedError {
    pub error_class: ErrorClass,
    pub message: String,
    pub strategy: RecoveryStrategy,
    pub retry_budget: u32,
}

impl ClassifiedError {
    pub fn new(error_class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            error_class,
            message: message.into(),
            strategy: error_class.recovery_strategy(),
            retry_budget: error_class.retry_budget(),
        }
    }

    pub fn should_retry(&self) -> bool {
        self.retry_budget > 0
    }

    /// Uses up one retry; the budget never goes below zero.
    pub fn consume_retry(&mut self) -> &mut Self {
        self.retry_budget = self.retry_budget.saturating_sub(1);
        self
    }

    pub fn is_fatal(&self) -> bool {
        !self.error_class.is_retryable()
            || (self.error_class == ErrorClass::CommandFailed
                && FATAL_COMMAND_RE.is_match(&self.message))
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg: String = self.message.chars().take(60).collect();
        write!(
            f,
            "[{}] strategy={} retries_left={} msg={:?}",
            self.error_class, self.strategy, self.retry_budget, msg
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, message: &str, action: &str, method: Method) -> ClassifiedError {
        let class = if FATAL_COMMAND_RE.is_match(message) {
            ErrorClass::CommandFailed
        } else {
            match_rules(message).unwrap_or_else(|| contextual(action, method))
        };

        let mut classified = ClassifiedError::new(class, message);
        if class == ErrorClass::CommandFailed && FATAL_COMMAND_RE.is_match(message) {
            classified.retry_budget = 0;
        }
        tracing::debug!(%classified, action, %method, "error classified");
        classified
    }

    /// Classifies a failed result, trusting an error code the backend already set.
    pub fn classify_result(&self, result: &ActionResult) -> ClassifiedError {
        if result.success {
            return ClassifiedError {
                retry_budget: 0,
                ..ClassifiedError::new(ErrorClass::Unknown, "")
            };
        }
        match result.error_code {
            Some(code) if code != ErrorClass::Unknown => {
                let mut c = ClassifiedError::new(code, result.error.clone());
                if code == ErrorClass::CommandFailed && FATAL_COMMAND_RE.is_match(&result.error) {
                    c.retry_budget = 0;
                }
                c
            }
            _ => self.classify(&result.error, &result.action, result.method),
        }
    }
}

fn match_rules(message: &str) -> Option<ErrorClass> {
    RULES
        .iter()
        .find(|(re, _)| re.is_match(message))
        .map(|(_, class)| *class)
}

fn contextual(action: &str, method: Method) -> ErrorClass {
    match method {
        Method::Accessibility => return ErrorClass::AccessibilityFail,
        Method::Cv => return ErrorClass::CvNoMatch,
        _ => {}
    }
    if BROWSER_ACTIONS.contains(&action) {
        ErrorClass::ElementNotFound
    } else if WINDOW_ACTIONS.contains(&action) {
        ErrorClass::WindowNotOpen
    } else {
        ErrorClass::Unknown
    }
}

/// Next method to try for a class, if the class implies one.
pub fn fallback_method(class: ErrorClass, current: Method) -> Option<Method> {
    match (class, current) {
        (ErrorClass::ElementNotFound, Method::Accessibility) => Some(Method::Cv),
        (ErrorClass::ElementNotFound, Method::Browser) => Some(Method::Accessibility),
        (ErrorClass::AccessibilityFail, _) => Some(Method::Cv),
        (ErrorClass::BrowserCrash, _) => Some(Method::Accessibility),
        (ErrorClass::WindowNotOpen, _) => Some(Method::System),
        _ => None,
    }
}
