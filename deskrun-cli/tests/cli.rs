use assert_cmd::Command;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const OPEN_EDITOR: &str = r#"
task: open_editor
intent: open gedit and check the window
steps:
  - action: open_app
    value: gedit
    method: system
  - action: verify_window
    value: gedit
"#;

const FAST_CONFIG: &str = r#"
retry:
  base_delay_ms: 1
  max_delay_ms: 1
  jitter: false
  fallback_pause_ms: 0
recovery:
  settle_ms: 0
  attempts: 1
  attempt_pause_ms: 0
verify:
  timeout_ms: 20
  poll_interval_ms: 5
  retry_wait_ms: 0
watchdog:
  tick_ms: 20
"#;

fn deskrun(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("deskrun").unwrap();
    cmd.current_dir(dir);
    cmd
}

fn write(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path.to_str().unwrap().to_string()
}

fn command_plan(task: &str, command: &str) -> String {
    format!(
        r#"{{"task": "{task}", "steps": [{{"action": "run_command", "value": "{command}", "method": "system"}}]}}"#
    )
}

#[test]
fn test_validate_command() {
    let tmp_dir = TempDir::new().unwrap();
    let plan = write(&tmp_dir, "plan.yaml", OPEN_EDITOR);

    let out = deskrun(tmp_dir.path())
        .args(["validate", &plan])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&out.get_output().stdout).to_string();
    assert!(stdout.contains("open_editor"), "{stdout}");
}

#[test]
fn test_validate_rejects_coordinates() {
    let tmp_dir = TempDir::new().unwrap();
    let plan = write(
        &tmp_dir,
        "plan.json",
        r#"{"task": "click", "steps": [{"action": "find_and_click", "value": "500,300", "method": "cv"}]}"#,
    );

    deskrun(tmp_dir.path())
        .args(["validate", &plan])
        .assert()
        .failure()
        .code(2); // VALIDATION_FAILED
}

#[test]
fn test_validate_unparseable_file() {
    let tmp_dir = TempDir::new().unwrap();
    let plan = write(&tmp_dir, "bad.yaml", "steps: [unclosed");

    deskrun(tmp_dir.path())
        .args(["validate", &plan])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_validate_missing_file() {
    let tmp_dir = TempDir::new().unwrap();

    deskrun(tmp_dir.path())
        .args(["validate", "does-not-exist.yaml"])
        .assert()
        .failure()
        .code(4); // RUNTIME_ERROR
}

#[test]
fn test_graph_dot_format() {
    let tmp_dir = TempDir::new().unwrap();
    let plan = write(&tmp_dir, "plan.yaml", OPEN_EDITOR);

    let out = deskrun(tmp_dir.path())
        .args(["graph", &plan, "--format", "dot"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&out.get_output().stdout).to_string();
    assert!(stdout.contains("digraph"), "{stdout}");
    assert!(stdout.contains("open_app"), "{stdout}");
}

#[test]
fn test_dry_run_succeeds_without_backends() {
    let tmp_dir = TempDir::new().unwrap();
    let plan = write(&tmp_dir, "plan.yaml", OPEN_EDITOR);

    let out = deskrun(tmp_dir.path())
        .args(["run", &plan, "--mode", "dry-run"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&out.get_output().stdout).to_string();
    assert!(stdout.contains("would run open_app"), "{stdout}");
}

#[test]
fn test_run_shell_command() {
    let tmp_dir = TempDir::new().unwrap();
    let plan = write(&tmp_dir, "plan.json", &command_plan("touch_marker", "touch marker.txt"));

    deskrun(tmp_dir.path())
        .args(["run", &plan])
        .assert()
        .success();
    assert!(tmp_dir.path().join("marker.txt").exists());
}

#[test]
fn test_run_json_output() {
    let tmp_dir = TempDir::new().unwrap();
    let plan = write(&tmp_dir, "plan.json", &command_plan("noop", "true"));

    let out = deskrun(tmp_dir.path())
        .args(["run", &plan, "--format", "json"])
        .assert()
        .success();
    let value: serde_json::Value = serde_json::from_slice(&out.get_output().stdout).unwrap();
    assert_eq!(value["success"], true);
    assert_eq!(value["steps_done"], 1);
    assert_eq!(value["metrics"]["steps"]["succeeded"], 1);
}

#[test]
fn test_safe_mode_blocks_shell_commands() {
    let tmp_dir = TempDir::new().unwrap();
    let plan = write(&tmp_dir, "plan.json", &command_plan("blocked", "touch marker.txt"));

    deskrun(tmp_dir.path())
        .args(["run", &plan, "--mode", "safe"])
        .assert()
        .success();
    assert!(!tmp_dir.path().join("marker.txt").exists());
}

#[test]
fn test_failed_run_leaves_crash_dump() {
    let tmp_dir = TempDir::new().unwrap();
    let plan = write(&tmp_dir, "plan.json", &command_plan("always_fails", "false"));
    let config = write(&tmp_dir, "engine.yaml", FAST_CONFIG);

    let out = deskrun(tmp_dir.path())
        .args(["run", &plan, "--config", &config])
        .assert()
        .failure()
        .code(3); // RUN_FAILED
    let stdout = String::from_utf8_lossy(&out.get_output().stdout).to_string();
    assert!(stdout.starts_with("FAILED always_fails"), "{stdout}");
    assert!(stdout.contains("crash dump:"), "{stdout}");

    let out = deskrun(tmp_dir.path())
        .args(["audit", "list", "--format", "json"])
        .assert()
        .success();
    let value: serde_json::Value = serde_json::from_slice(&out.get_output().stdout).unwrap();
    let dumps = value["crash_dumps"].as_array().unwrap();
    assert_eq!(dumps.len(), 1);
    let task_id = dumps[0].as_str().unwrap().to_string();
    assert!(task_id.starts_with("always_fails_"), "{task_id}");

    let out = deskrun(tmp_dir.path())
        .args(["audit", "show", &task_id, "--format", "json"])
        .assert()
        .success();
    let dump: serde_json::Value = serde_json::from_slice(&out.get_output().stdout).unwrap();
    assert!(dump["error"].as_str().unwrap().contains("command failed"), "{dump}");

    deskrun(tmp_dir.path())
        .args(["audit", "show", &task_id, "--log", "--format", "json"])
        .assert()
        .success();
}

#[test]
fn test_audit_show_unknown_task() {
    let tmp_dir = TempDir::new().unwrap();

    deskrun(tmp_dir.path())
        .args(["audit", "show", "nope_0_deadbeef"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_audit_list_empty_dir() {
    let tmp_dir = TempDir::new().unwrap();

    let out = deskrun(tmp_dir.path())
        .args(["audit", "list"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&out.get_output().stdout).to_string();
    assert!(stdout.contains("no crash dumps"), "{stdout}");
}
