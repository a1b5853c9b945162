use std::sync::LazyLock;

use deskrun_core::ErrorClass;
use regex::Regex;

macro_rules! rule {
    ($re:expr, $class:expr) => {
        (Regex::new(concat!("(?i)", $re)).expect("valid"), $class)
    };
}

/// Ordered rules; the first match wins.
pub(crate) static RULES: LazyLock<Vec<(Regex, ErrorClass)>> = LazyLock::new(|| {
    vec![
        rule!(r"timeout|timed? out|timeouterror", ErrorClass::Timeout),
        rule!(
            r"element not found|no such element|locator.*not visible|element.*invisible|find_element|elementnotfound",
            ErrorClass::ElementNotFound
        ),
        rule!(
            r"window not found|wmctrl.*fail|no window.*title|window.*does not exist",
            ErrorClass::WindowNotOpen
        ),
        rule!(
            r"process.*dead|pgrep.*fail|no such process|process not running",
            ErrorClass::ProcessDead
        ),
        rule!(
            r"permission denied|operation not permitted|access denied|sudo required",
            ErrorClass::PermissionDenied
        ),
        rule!(
            r"browser.*crash|playwright.*closed|page.*crashed|connection refused.*browser|target closed",
            ErrorClass::BrowserCrash
        ),
        rule!(
            r"connection refused|network.*error|dns.*fail|http.*error [45]\d\d|ssl.*error|name.*resolution",
            ErrorClass::NetworkError
        ),
        rule!(
            r"pyatspi|at-spi|dbus.*error|accessibility.*fail|atspi",
            ErrorClass::AccessibilityFail
        ),
        rule!(
            r"template.*not found|no match|matchtemplate|confidence.*below",
            ErrorClass::CvNoMatch
        ),
        rule!(
            r"schema.*fail|validation.*fail|missing.*field|invalid.*json",
            ErrorClass::SchemaInvalid
        ),
        rule!(
            r"command.*fail|returncode.*[1-9]|subprocess.*error|exit code",
            ErrorClass::CommandFailed
        ),
    ]
});

/// Command-level failures that will not change on retry.
pub(crate) static FATAL_COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)command not found|syntax error|exit code:? 127\b").expect("valid")
});

pub(crate) const BROWSER_ACTIONS: &[&str] = &[
    "find_and_click",
    "click_button",
    "navigate",
    "type_text",
    "wait_for_element",
];

pub(crate) const WINDOW_ACTIONS: &[&str] = &["verify_window", "focus_window", "close_window"];
