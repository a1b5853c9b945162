use crate::types::Plan;
use crate::validate::validator::Validator;

use super::step;

const MAX_TASK_NAME: usize = 100;

pub(crate) fn validate_plan(v: &mut Validator, plan: &Plan) {
    let task = plan.task.trim();
    if task.is_empty() {
        v.push("task", "must be a non-empty string");
    } else if task.chars().count() > MAX_TASK_NAME {
        v.push("task", format!("must be at most {MAX_TASK_NAME} characters"));
    }

    if plan.steps.is_empty() {
        v.push("steps", "plan has no steps");
    }

    v.validate_extensions("$", &plan.extensions);

    for (idx, s) in plan.steps.iter().enumerate() {
        step::validate_step(v, &format!("steps[{idx}]"), s);
    }
}
