use deskrun_core::{ActionResult, ErrorClass, Method, RecoveryStrategy};
use deskrun_exec::{fallback_method, ErrorClassifier};

#[test]
fn classifies_messages_by_ordered_rules() {
    let c = ErrorClassifier::new();
    let cases = [
        ("TimeoutError after 5000ms", ErrorClass::Timeout),
        ("element not found: Submit", ErrorClass::ElementNotFound),
        ("window does not exist: Files", ErrorClass::WindowNotOpen),
        ("no such process", ErrorClass::ProcessDead),
        ("bash: /etc/shadow: Permission denied", ErrorClass::PermissionDenied),
        ("Target closed", ErrorClass::BrowserCrash),
        ("dns lookup fail for example.com", ErrorClass::NetworkError),
        ("AT-SPI registry unreachable", ErrorClass::AccessibilityFail),
        ("confidence 0.41 below threshold", ErrorClass::CvNoMatch),
        ("missing required field 'steps'", ErrorClass::SchemaInvalid),
        ("command failed: exit code 1", ErrorClass::CommandFailed),
    ];
    for (msg, want) in cases {
        assert_eq!(c.classify(msg, "run_command", Method::System).error_class, want, "{msg}");
    }
}

#[test]
fn timeout_wins_over_later_rules() {
    let c = ErrorClassifier::new();
    let e = c.classify("network error: request timed out", "navigate", Method::Browser);
    assert_eq!(e.error_class, ErrorClass::Timeout);
}

#[test]
fn contextual_fallback_uses_method_then_action() {
    let c = ErrorClassifier::new();
    assert_eq!(
        c.classify("weird", "find_and_click", Method::Accessibility).error_class,
        ErrorClass::AccessibilityFail
    );
    assert_eq!(c.classify("weird", "find_and_click", Method::Cv).error_class, ErrorClass::CvNoMatch);
    assert_eq!(
        c.classify("weird", "click_button", Method::Browser).error_class,
        ErrorClass::ElementNotFound
    );
    assert_eq!(
        c.classify("weird", "focus_window", Method::System).error_class,
        ErrorClass::WindowNotOpen
    );
    assert_eq!(c.classify("weird", "set_volume", Method::System).error_class, ErrorClass::Unknown);
}

#[test]
fn class_carries_strategy_and_budget() {
    let c = ErrorClassifier::new();
    let e = c.classify("network error: connection reset", "navigate", Method::Browser);
    assert_eq!(e.strategy, RecoveryStrategy::RetryWithBackoff);
    assert_eq!(e.retry_budget, 4);

    let denied = c.classify("Permission denied", "run_command", Method::System);
    assert_eq!(denied.retry_budget, 0);
    assert!(!denied.should_retry());
    assert!(denied.is_fatal());
}

#[test]
fn fatal_command_errors_have_no_budget() {
    let c = ErrorClassifier::new();
    let e = c.classify("sh: 1: frobnicate: command not found", "run_command", Method::System);
    assert_eq!(e.error_class, ErrorClass::CommandFailed);
    assert_eq!(e.retry_budget, 0);
    assert!(e.is_fatal());

    let plain = c.classify("command failed: exit code 2", "run_command", Method::System);
    assert!(!plain.is_fatal());
    assert_eq!(plain.retry_budget, 2);
}

#[test]
fn consume_retry_never_underflows() {
    let c = ErrorClassifier::new();
    let mut e = c.classify("no such process", "open_app", Method::System);
    assert_eq!(e.retry_budget, 1);
    e.consume_retry();
    e.consume_retry();
    assert_eq!(e.retry_budget, 0);
}

#[test]
fn classify_result_trusts_specific_backend_codes() {
    let c = ErrorClassifier::new();
    let r = ActionResult::fail("navigate", "x", Method::Browser, "opaque", ErrorClass::BrowserCrash);
    assert_eq!(c.classify_result(&r).error_class, ErrorClass::BrowserCrash);

    let unknown = ActionResult::fail("navigate", "x", Method::Browser, "timed out", ErrorClass::Unknown);
    assert_eq!(c.classify_result(&unknown).error_class, ErrorClass::Timeout);
}

#[test]
fn fallback_method_hints() {
    assert_eq!(
        fallback_method(ErrorClass::ElementNotFound, Method::Accessibility),
        Some(Method::Cv)
    );
    assert_eq!(fallback_method(ErrorClass::WindowNotOpen, Method::Accessibility), Some(Method::System));
    assert_eq!(fallback_method(ErrorClass::NetworkError, Method::Browser), None);
}
