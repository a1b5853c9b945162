use std::collections::BTreeMap;
use std::sync::Arc;

use deskrun_core::Method;

use super::backend::ActionBackend;
use crate::retry::method_priority;

pub const BROWSER_NATIVE: &[&str] = &["navigate", "search", "click_result"];

pub const SYSTEM_NATIVE: &[&str] = &[
    "open_app",
    "open_terminal",
    "run_command",
    "set_volume",
    "set_brightness",
    "close_window",
    "focus_window",
    "verify_window",
];

/// Default capability tag for an action when no usable hint is given.
pub fn static_method(action: &str) -> Method {
    if BROWSER_NATIVE.contains(&action) {
        Method::Browser
    } else if SYSTEM_NATIVE.contains(&action) {
        Method::System
    } else {
        Method::Accessibility
    }
}

/// Method -> backend table plus capability-aware resolution.
#[derive(Default, Clone)]
pub struct BackendRegistry {
    backends: BTreeMap<Method, Arc<dyn ActionBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a backend under the method it reports. Replaces any earlier one.
    pub fn register(&mut self, backend: Arc<dyn ActionBackend>) -> &mut Self {
        let method = backend.method();
        if method == Method::Auto {
            tracing::warn!("ignoring backend registered under 'auto'");
            return self;
        }
        self.backends.insert(method, backend);
        self
    }

    pub fn with(mut self, backend: Arc<dyn ActionBackend>) -> Self {
        self.register(backend);
        self
    }

    pub fn get(&self, method: Method) -> Option<&Arc<dyn ActionBackend>> {
        self.backends.get(&method)
    }

    pub fn is_available(&self, method: Method) -> bool {
        self.backends
            .get(&method)
            .map(|b| b.is_available())
            .unwrap_or(false)
    }

    pub fn available_methods(&self) -> Vec<Method> {
        self.backends
            .iter()
            .filter(|(_, b)| b.is_available())
            .map(|(m, _)| *m)
            .collect()
    }

    /// Picks the method a step will actually run with.
    ///
    /// An available hint wins; otherwise the static action table, then the action's
    /// priority list, then any available backend.
    pub fn resolve(&self, action: &str, hint: Method) -> Option<Method> {
        if hint != Method::Auto && self.is_available(hint) {
            return Some(hint);
        }
        let default = static_method(action);
        if self.is_available(default) {
            return Some(default);
        }
        method_priority(action)
            .iter()
            .copied()
            .find(|m| self.is_available(*m))
            .or_else(|| self.available_methods().into_iter().next())
    }

    /// Best backend for compensating actions: system first, then whatever resolves.
    pub fn rollback_method(&self, action: &str) -> Option<Method> {
        if self.is_available(Method::System) {
            Some(Method::System)
        } else {
            self.resolve(action, Method::Auto)
        }
    }

    /// Resets every registered backend, logging failures.
    pub async fn reset_all(&self) {
        for (method, backend) in &self.backends {
            if let Err(e) = backend.reset().await {
                tracing::warn!(%method, error = %e, "backend reset failed");
            }
        }
    }
}
