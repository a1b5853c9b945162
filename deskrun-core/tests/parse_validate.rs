use deskrun_core::{parse_plan_str, validate_plan, ParseError, PlanFormat, Validate};

#[test]
fn json_plan_is_auto_detected() {
    let input = r#"{
        "task": "lock_screen",
        "intent": "lock the session",
        "steps": [{"action": "run_command", "value": "loginctl lock-session", "method": "system"}]
    }"#;
    let parsed = parse_plan_str(input, PlanFormat::Auto).unwrap();
    assert_eq!(parsed.format, PlanFormat::Json);
    assert_eq!(parsed.plan.task, "lock_screen");
    assert_eq!(parsed.plan.steps[0].method, "system");
    assert!(parsed.plan.validate().unwrap().warnings.is_empty());
}

#[test]
fn yaml_plan_with_scalar_values() {
    let input = r#"
task: louder
steps:
  - action: set_volume
    value: 80
  - action: open_menu
"#;
    let parsed = parse_plan_str(input, PlanFormat::Auto).unwrap();
    assert_eq!(parsed.format, PlanFormat::Yaml);
    let steps = &parsed.plan.steps;
    assert_eq!(steps[0].value, "80");
    assert_eq!(steps[0].method, "auto");
    assert_eq!(steps[1].value, "");
    validate_plan(&parsed.plan).unwrap();
}

#[test]
fn garbage_is_a_parse_error() {
    assert!(matches!(
        parse_plan_str("", PlanFormat::Auto),
        Err(ParseError::UnknownFormat)
    ));
    assert!(parse_plan_str("{ not json", PlanFormat::Auto).is_err());
}

#[test]
fn coordinates_are_rejected() {
    let input = r#"
task: click somewhere
steps:
  - action: find_and_click
    value: "(120, 340)"
  - action: click_button
    value: OK
    x: 10
    y: 20
  - action: type_text
    value: "x=5 y=6"
"#;
    let plan = parse_plan_str(input, PlanFormat::Yaml).unwrap().plan;
    let err = validate_plan(&plan).unwrap_err();
    let msgs = err.messages();
    assert!(msgs.iter().any(|m| m.starts_with("steps[0].value")));
    assert!(msgs.iter().any(|m| m.starts_with("steps[1].x")));
    assert!(msgs.iter().any(|m| m.starts_with("steps[1].y")));
    assert!(msgs.iter().any(|m| m.starts_with("steps[2].value")));
}

#[test]
fn required_fields_are_enforced() {
    let input = r#"{"task": "", "steps": [{"action": "open_app"}, {"value": "x"}]}"#;
    let plan = parse_plan_str(input, PlanFormat::Json).unwrap().plan;
    let msgs = validate_plan(&plan).unwrap_err().messages();
    assert!(msgs.contains(&"task: must be a non-empty string".to_string()));
    assert!(msgs.iter().any(|m| m.starts_with("steps[0].value")));
    assert!(msgs.contains(&"steps[1].action: is required".to_string()));
}

#[test]
fn overlong_task_and_empty_steps_fail() {
    let input = format!(r#"{{"task": "{}", "steps": []}}"#, "a".repeat(101));
    let plan = parse_plan_str(&input, PlanFormat::Json).unwrap().plan;
    let msgs = validate_plan(&plan).unwrap_err().messages();
    assert_eq!(msgs.len(), 2);
}

#[test]
fn unknown_action_and_method_only_warn() {
    let input = r#"{"task": "t", "steps": [{"action": "teleport", "value": "mars", "method": "magic"}]}"#;
    let plan = parse_plan_str(input, PlanFormat::Json).unwrap().plan;
    let report = validate_plan(&plan).unwrap();
    assert_eq!(report.warnings.len(), 2);
}
