//! Per-action timeout/retry budgets and default compensating actions.

use std::time::Duration;

pub const KNOWN_ACTIONS: &[&str] = &[
    "open_app",
    "open_terminal",
    "navigate",
    "find_and_click",
    "click_button",
    "click_result",
    "type_text",
    "search",
    "verify_window",
    "focus_window",
    "close_window",
    "wait_for_element",
    "set_volume",
    "set_brightness",
    "run_command",
    "scroll",
    "get_text",
    "open_menu",
];

const NO_VALUE_ACTIONS: &[&str] = &["open_menu", "scroll", "open_terminal"];

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_RETRIES: u32 = 3;

pub fn is_known_action(action: &str) -> bool {
    KNOWN_ACTIONS.contains(&action)
}

/// Known actions that need a target value.
pub fn requires_value(action: &str) -> bool {
    is_known_action(action) && !NO_VALUE_ACTIONS.contains(&action)
}

pub fn action_timeout(action: &str) -> Duration {
    let secs = match action {
        "open_app" => 12,
        "open_terminal" => 8,
        "navigate" => 30,
        "find_and_click" => 8,
        "click_button" | "click_result" => 6,
        "type_text" | "search" => 5,
        "verify_window" => 15,
        "focus_window" | "close_window" => 5,
        "wait_for_element" => 20,
        "set_volume" | "set_brightness" => 4,
        "run_command" => 30,
        "scroll" => 3,
        "get_text" | "open_menu" => 5,
        _ => return DEFAULT_TIMEOUT,
    };
    Duration::from_secs(secs)
}

pub fn action_max_retries(action: &str) -> u32 {
    match action {
        "open_app" => 2,
        "navigate" | "find_and_click" | "click_button" | "verify_window" => 3,
        "type_text" | "run_command" | "wait_for_element" => 2,
        _ => DEFAULT_MAX_RETRIES,
    }
}

pub fn rollback_action(action: &str) -> Option<&'static str> {
    match action {
        "open_app" | "open_terminal" => Some("close_window"),
        "close_window" => Some("open_app"),
        _ => None,
    }
}
