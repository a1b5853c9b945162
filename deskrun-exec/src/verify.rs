//! Post-execution checks that the desktop actually changed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::executor::StepRequest;

/// Read-only view of the desktop. Every answer is optional: `None` means "cannot tell".
#[async_trait]
pub trait WorldProbe: Send + Sync {
    async fn window_titles(&self) -> Option<Vec<String>>;

    async fn active_window(&self) -> Option<String>;

    async fn process_running(&self, name: &str) -> Option<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Pause before re-checking after a failed verification.
    pub retry_wait: Duration,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(300),
            retry_wait: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyCheck {
    WindowPresent,
    WindowFocused,
    WindowAbsent,
    /// The launched app shows up as a process, or failing that, as a window.
    ProcessRunning,
    UrlLoaded,
    Implicit,
}

impl VerifyCheck {
    pub fn for_action(action: &str) -> Self {
        match action {
            "verify_window" | "open_terminal" => VerifyCheck::WindowPresent,
            "open_app" => VerifyCheck::ProcessRunning,
            "focus_window" => VerifyCheck::WindowFocused,
            "close_window" => VerifyCheck::WindowAbsent,
            "navigate" => VerifyCheck::UrlLoaded,
            _ => VerifyCheck::Implicit,
        }
    }
}

const ERROR_POPUP_KEYWORDS: &[&str] = &["error", "warning", "failed", "problem", "unable", "cannot"];

#[derive(Clone)]
pub struct Verifier {
    config: VerifyConfig,
    probe: Option<Arc<dyn WorldProbe>>,
}

impl Verifier {
    pub fn new(config: VerifyConfig) -> Self {
        Self {
            config,
            probe: None,
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn WorldProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn config(&self) -> &VerifyConfig {
        &self.config
    }

    pub async fn verify(&self, step: &StepRequest) -> bool {
        let Some(probe) = self.probe.as_deref() else {
            return true;
        };
        let value = step.value.trim();
        let check = VerifyCheck::for_action(&step.action);
        let verified = match check {
            VerifyCheck::Implicit => true,
            _ if value.is_empty() => true,
            VerifyCheck::WindowPresent => self.poll(|| window_present(probe, value)).await,
            VerifyCheck::WindowFocused => self.poll(|| window_focused(probe, value)).await,
            VerifyCheck::WindowAbsent => self.poll(|| window_absent(probe, value)).await,
            VerifyCheck::ProcessRunning => self.poll(|| app_started(probe, value)).await,
            VerifyCheck::UrlLoaded => url_loaded(probe, value).await,
        };
        if !verified {
            tracing::warn!(step_id = %step.step_id, action = %step.action, value, ?check, "verification failed");
        }
        verified
    }

    /// Waits for a window whose title contains `title`.
    pub async fn wait_for_window(&self, title: &str, timeout: Duration) -> bool {
        let Some(probe) = self.probe.as_deref() else {
            return true;
        };
        self.poll_for(timeout, || window_present(probe, title)).await
    }

    pub async fn wait_for_process(&self, name: &str, timeout: Duration) -> bool {
        let Some(probe) = self.probe.as_deref() else {
            return true;
        };
        self.poll_for(timeout, || async move {
            probe.process_running(name).await.unwrap_or(true)
        })
        .await
    }

    /// The first error-like keyword found in any open window title.
    pub async fn error_popup(&self) -> Option<String> {
        let titles = self.probe.as_deref()?.window_titles().await?;
        let joined = titles.join("\n").to_lowercase();
        ERROR_POPUP_KEYWORDS
            .iter()
            .find(|kw| joined.contains(*kw))
            .map(|kw| kw.to_string())
    }

    async fn poll<F, Fut>(&self, check: F) -> bool
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        self.poll_for(self.config.timeout, check).await
    }

    async fn poll_for<F, Fut>(&self, timeout: Duration, check: F) -> bool
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if check().await {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(VerifyConfig::default())
    }
}

async fn window_present(probe: &dyn WorldProbe, title: &str) -> bool {
    match probe.window_titles().await {
        Some(titles) => contains_title(&titles, title),
        None => true,
    }
}

async fn window_absent(probe: &dyn WorldProbe, title: &str) -> bool {
    match probe.window_titles().await {
        Some(titles) => !contains_title(&titles, title),
        None => true,
    }
}

async fn app_started(probe: &dyn WorldProbe, name: &str) -> bool {
    match probe.process_running(name).await {
        Some(true) => true,
        Some(false) => matches!(probe.window_titles().await, Some(t) if contains_title(&t, name)),
        None => window_present(probe, name).await,
    }
}

async fn window_focused(probe: &dyn WorldProbe, title: &str) -> bool {
    match probe.active_window().await {
        Some(active) => active.to_lowercase().contains(&title.to_lowercase()),
        None => window_present(probe, title).await,
    }
}

/// Passes when any window title names a significant part of the host. Browsers that do not
/// put the site in their title are given the benefit of the doubt.
async fn url_loaded(probe: &dyn WorldProbe, url: &str) -> bool {
    let host = host_of(url);
    if let Some(titles) = probe.window_titles().await {
        let joined = titles.join("\n").to_lowercase();
        if host.split('.').any(|part| part.len() > 3 && joined.contains(part)) {
            return true;
        }
    }
    tracing::debug!(host, "navigation not visible in window titles, assuming loaded");
    true
}

fn contains_title(titles: &[String], needle: &str) -> bool {
    let needle = needle.to_lowercase();
    titles.iter().any(|t| t.to_lowercase().contains(&needle))
}

fn host_of(url: &str) -> String {
    let rest = url
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    rest.split(['/', '?', '#'])
        .next()
        .unwrap_or(rest)
        .to_lowercase()
}
