use crate::graph::budgets::{is_known_action, requires_value};
use crate::types::{Method, PlanStep};
use crate::validate::validator::Validator;

pub(crate) fn validate_step(v: &mut Validator, path: &str, step: &PlanStep) {
    let action = step.action.trim();
    if action.is_empty() {
        v.push(format!("{path}.action"), "is required");
        return;
    }

    if !is_known_action(action) {
        v.warn(format!("{path}.action"), format!("unknown action '{action}'"));
    }

    if requires_value(action) && step.value.trim().is_empty() {
        v.push(format!("{path}.value"), format!("is required for action '{action}'"));
    }

    if Validator::looks_like_coordinates(&step.value) {
        v.push(
            format!("{path}.value"),
            format!("'{}' looks like raw pixel coordinates", step.value),
        );
    }

    if step.method.parse::<Method>().is_err() {
        v.warn(
            format!("{path}.method"),
            format!("unknown method '{}', treating as auto", step.method),
        );
    }

    if let Some(id) = &step.id {
        if id.trim().is_empty() {
            v.push(format!("{path}.id"), "must not be empty when present");
        }
    }

    v.validate_extensions(path, &step.extensions);
}
