mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::ScriptedBackend;
use deskrun_core::{ErrorClass, Method};
use deskrun_exec::executor::{BackendRegistry, StepExecutor, StepRequest};
use deskrun_exec::{
    DryRunIntent, ExecGate, ExecMode, ExecutionContext, Recovery, RecoveryConfig, Verifier,
    VerifyConfig, WorldProbe,
};

#[derive(Default)]
struct FakeDesktop {
    titles: Mutex<Option<Vec<String>>>,
    active: Mutex<Option<String>>,
    running: Option<bool>,
}

impl FakeDesktop {
    fn with_titles(titles: &[&str]) -> Self {
        let desktop = Self::default();
        desktop.set_titles(titles);
        desktop
    }

    fn set_titles(&self, titles: &[&str]) {
        *self.titles.lock().unwrap() = Some(titles.iter().map(|t| t.to_string()).collect());
    }
}

#[async_trait]
impl WorldProbe for FakeDesktop {
    async fn window_titles(&self) -> Option<Vec<String>> {
        self.titles.lock().unwrap().clone()
    }

    async fn active_window(&self) -> Option<String> {
        self.active.lock().unwrap().clone()
    }

    async fn process_running(&self, _name: &str) -> Option<bool> {
        self.running
    }
}

fn quick_verify() -> VerifyConfig {
    VerifyConfig {
        timeout: Duration::from_millis(40),
        poll_interval: Duration::from_millis(10),
        retry_wait: Duration::from_millis(10),
    }
}

fn verifier(desktop: Arc<FakeDesktop>) -> Verifier {
    Verifier::new(quick_verify()).with_probe(desktop)
}

#[test]
fn exec_mode_parses_aliases() {
    assert_eq!("live".parse::<ExecMode>().unwrap(), ExecMode::Live);
    assert_eq!("DRY-RUN".parse::<ExecMode>().unwrap(), ExecMode::DryRun);
    assert_eq!("dry".parse::<ExecMode>().unwrap(), ExecMode::DryRun);
    assert_eq!("safe".parse::<ExecMode>().unwrap(), ExecMode::SafeMode);
    assert!("yolo".parse::<ExecMode>().is_err());
    assert_eq!(ExecMode::SafeMode.to_string(), "safe_mode");
    assert_eq!(ExecMode::default(), ExecMode::Live);
}

#[test]
fn mode_gate_per_mode() {
    let live = ExecutionContext::new(ExecMode::Live);
    assert_eq!(live.can_execute("run_command"), ExecGate::Allowed);

    let dry = ExecutionContext::new(ExecMode::DryRun);
    assert_eq!(dry.can_execute("get_text"), ExecGate::Simulated);

    let safe = ExecutionContext::new(ExecMode::SafeMode);
    assert_eq!(safe.can_execute("verify_window"), ExecGate::Allowed);
    match safe.can_execute("run_command") {
        ExecGate::Blocked(reason) => {
            assert!(reason.starts_with("blocked"));
            assert!(reason.contains("run_command"));
        }
        other => panic!("expected block, got {other:?}"),
    }
}

#[test]
fn step_records_update_context() {
    let ctx = ExecutionContext::new(ExecMode::Live);
    ctx.increment_retry();
    ctx.increment_retry();
    assert_eq!(ctx.retry_count(), 2);

    ctx.record_step_start("step_1", "open_app", "gedit");
    ctx.record_step_end("step_1", true, Method::System, None);
    assert_eq!(ctx.active_app().as_deref(), Some("gedit"));
    assert_eq!(ctx.retry_count(), 0);
    assert_eq!(ctx.last_success_method(), Some(Method::System));

    ctx.record_step_start("step_2", "focus_window", "Untitled");
    ctx.record_step_end("step_2", true, Method::Accessibility, None);
    assert_eq!(ctx.active_window().as_deref(), Some("Untitled"));

    ctx.record_step_start("step_3", "focus_window", "Other");
    ctx.record_step_end("step_3", false, Method::System, Some("window does not exist"));
    assert_eq!(ctx.active_window().as_deref(), Some("Untitled"));
    assert_eq!(ctx.last_success_method(), Some(Method::Accessibility));

    let history = ctx.history();
    assert_eq!(history.len(), 3);
    assert_eq!(history[2].success, Some(false));
    assert_eq!(history[2].error.as_deref(), Some("window does not exist"));
}

#[test]
fn snapshot_keeps_last_five_steps() {
    let ctx = ExecutionContext::new(ExecMode::SafeMode);
    for i in 1..=8 {
        let id = format!("step_{i}");
        ctx.record_step_start(&id, "get_text", "x");
        ctx.record_step_end(&id, true, Method::Accessibility, None);
    }
    ctx.record_blocked("step_9", "blocked: 'run_command' not allowed in SAFE_MODE");
    ctx.set_system_load(3.0);

    let snap = ctx.snapshot();
    assert_eq!(snap.mode, ExecMode::SafeMode);
    assert_eq!(snap.steps_recorded, 8);
    assert_eq!(snap.blocked, 1);
    assert_eq!(snap.system_load, 1.0);
    let ids: Vec<_> = snap.recent.iter().map(|r| r.step_id.as_str()).collect();
    assert_eq!(ids, vec!["step_4", "step_5", "step_6", "step_7", "step_8"]);
}

#[test]
fn dry_run_intents_are_kept_in_order() {
    let ctx = ExecutionContext::new(ExecMode::DryRun);
    for (id, action) in [("a", "open_app"), ("b", "type_text")] {
        ctx.record_dry_run(DryRunIntent {
            step_id: id.into(),
            action: action.into(),
            value: "v".into(),
            method: Method::Auto,
        });
    }
    let intents = ctx.dry_run_intents();
    assert_eq!(intents.len(), 2);
    assert_eq!(intents[1].action, "type_text");
}

#[tokio::test]
async fn verifier_without_probe_passes() {
    let v = Verifier::new(quick_verify());
    assert!(v.verify(&StepRequest::new("verify_window", "Nowhere", Method::System)).await);
    assert!(v.wait_for_window("Nowhere", Duration::from_millis(5)).await);
    assert!(v.error_popup().await.is_none());
}

#[tokio::test]
async fn window_checks_follow_titles() {
    let desktop = Arc::new(FakeDesktop::with_titles(&["Untitled - gedit", "Terminal"]));
    let v = verifier(desktop.clone());

    assert!(v.verify(&StepRequest::new("verify_window", "GEDIT", Method::System)).await);
    assert!(!v.verify(&StepRequest::new("verify_window", "Firefox", Method::System)).await);
    assert!(v.verify(&StepRequest::new("close_window", "Firefox", Method::System)).await);
    assert!(!v.verify(&StepRequest::new("close_window", "Terminal", Method::System)).await);
    // Actions without an observable effect pass.
    assert!(v.verify(&StepRequest::new("type_text", "hello", Method::Accessibility)).await);
    assert!(v.verify(&StepRequest::new("verify_window", "  ", Method::System)).await);
}

#[tokio::test]
async fn launches_are_checked_against_processes_and_windows() {
    let nothing = Arc::new(FakeDesktop {
        running: Some(false),
        ..FakeDesktop::with_titles(&[])
    });
    let v = verifier(nothing.clone());
    assert!(!v.verify(&StepRequest::new("open_app", "gedit", Method::System)).await);
    assert!(!v.verify(&StepRequest::new("open_terminal", "Terminal", Method::System)).await);

    // A window is enough when the process list disagrees.
    nothing.set_titles(&["Untitled - gedit", "Terminal"]);
    assert!(v.verify(&StepRequest::new("open_app", "gedit", Method::System)).await);
    assert!(v.verify(&StepRequest::new("open_terminal", "Terminal", Method::System)).await);

    let running = Arc::new(FakeDesktop {
        running: Some(true),
        ..FakeDesktop::with_titles(&[])
    });
    assert!(verifier(running).verify(&StepRequest::new("open_app", "gedit", Method::System)).await);

    // No process answer: fall back to window titles.
    let titles_only = Arc::new(FakeDesktop::with_titles(&["Files"]));
    let v = verifier(titles_only);
    assert!(!v.verify(&StepRequest::new("open_app", "gedit", Method::System)).await);
    assert!(v.verify(&StepRequest::new("open_app", "files", Method::System)).await);
}

#[tokio::test]
async fn focus_check_prefers_active_window() {
    let desktop = Arc::new(FakeDesktop::with_titles(&["Files", "Terminal"]));
    *desktop.active.lock().unwrap() = Some("Terminal".into());
    let v = verifier(desktop);

    assert!(v.verify(&StepRequest::new("focus_window", "terminal", Method::System)).await);
    assert!(!v.verify(&StepRequest::new("focus_window", "Files", Method::System)).await);
}

#[tokio::test]
async fn navigate_checks_significant_host_parts() {
    let desktop = Arc::new(FakeDesktop::with_titles(&["rust-lang.org - Learn Rust - Firefox"]));
    let v = verifier(desktop);
    assert!(v.verify(&StepRequest::new("navigate", "https://www.rust-lang.org/learn", Method::Browser)).await);
    // Not visible in any title: still treated as loaded.
    assert!(v.verify(&StepRequest::new("navigate", "https://example.com", Method::Browser)).await);
}

#[tokio::test]
async fn detects_error_popups() {
    let desktop = Arc::new(FakeDesktop::with_titles(&["gedit", "Unable to save file"]));
    let v = verifier(desktop.clone());
    assert_eq!(v.error_popup().await.as_deref(), Some("unable"));

    desktop.set_titles(&["gedit"]);
    assert!(v.error_popup().await.is_none());
}

#[tokio::test]
async fn waits_for_processes() {
    let gone = Arc::new(FakeDesktop {
        running: Some(false),
        ..FakeDesktop::default()
    });
    assert!(!verifier(gone).wait_for_process("firefox", Duration::from_millis(30)).await);

    let unknown = Arc::new(FakeDesktop::default());
    assert!(verifier(unknown).wait_for_process("firefox", Duration::from_millis(30)).await);
}

#[tokio::test]
async fn full_reset_resets_backends_and_reruns_on_system() {
    let system = Arc::new(ScriptedBackend::ok(Method::System));
    let a11y = Arc::new(ScriptedBackend::ok(Method::Accessibility));
    let registry = Arc::new(
        BackendRegistry::new()
            .with(system.clone())
            .with(a11y.clone()),
    );
    let exec = StepExecutor::new(registry.clone());
    let recovery = Recovery::new(RecoveryConfig {
        settle: Duration::ZERO,
        attempts: 2,
        attempt_pause: Duration::ZERO,
    });

    let step = StepRequest::new("close_window", "gedit", Method::Accessibility);
    let result = recovery
        .full_reset(&registry, &exec, &step, ErrorClass::Timeout)
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.method, Method::System);
    assert_eq!(system.resets(), 1);
    assert_eq!(a11y.resets(), 1);
    assert_eq!(a11y.call_count(), 0);

    let skipped = recovery
        .full_reset(&registry, &exec, &step, ErrorClass::PermissionDenied)
        .await;
    assert!(skipped.is_none());
    assert_eq!(system.resets(), 1);
}

#[tokio::test]
async fn verify_recovery_reruns_the_step_once() {
    let desktop = Arc::new(FakeDesktop::with_titles(&["Terminal"]));
    let system = Arc::new(ScriptedBackend::ok(Method::System));
    let exec = StepExecutor::new(Arc::new(BackendRegistry::new().with(system.clone())));
    let v = verifier(desktop.clone());
    let recovery = Recovery::default();

    let step = StepRequest::new("verify_window", "gedit", Method::System);
    assert!(!recovery.recover_verify_failure(&v, &exec, &step).await);
    assert_eq!(system.call_count(), 1);

    desktop.set_titles(&["gedit"]);
    assert!(recovery.recover_verify_failure(&v, &exec, &step).await);
    assert_eq!(system.call_count(), 1);
}
