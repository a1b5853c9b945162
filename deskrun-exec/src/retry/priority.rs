use deskrun_core::Method;

use Method::{Accessibility, Browser, Cv, System};

pub const DEFAULT_PRIORITY: &[Method] = &[Accessibility, System, Browser, Cv];

const SINGLE_METHOD_ACTIONS: &[&str] = &["run_command", "set_volume", "set_brightness", "open_terminal"];

/// Static method preference for an action, best first.
pub fn method_priority(action: &str) -> &'static [Method] {
    match action {
        "open_app" => &[System, Accessibility, Cv],
        "open_terminal" | "set_volume" | "set_brightness" | "run_command" => &[System],
        "find_and_click" | "click_button" | "click_result" | "get_text" => {
            &[Accessibility, Browser, Cv]
        }
        "type_text" => &[Accessibility, Browser, System],
        "search" | "wait_for_element" => &[Accessibility, Browser],
        "navigate" => &[Browser],
        "focus_window" | "close_window" | "verify_window" | "open_menu" => &[System, Accessibility],
        "scroll" => &[Browser, System, Cv],
        _ => DEFAULT_PRIORITY,
    }
}

/// Actions that can only ever run through the system backend.
pub fn is_single_method(action: &str) -> bool {
    SINGLE_METHOD_ACTIONS.contains(&action)
}
