mod rules;
mod validator;

use crate::error::ValidationError;
use crate::types::Plan;
use validator::Validator;

pub use validator::ValidationReport;

pub trait Validate {
    fn validate(&self) -> Result<ValidationReport, ValidationError>;
}

impl Validate for Plan {
    fn validate(&self) -> Result<ValidationReport, ValidationError> {
        validate_plan(self)
    }
}

/// Checks the plan shape before any graph is built.
///
/// Hard errors (missing fields, pixel coordinates) fail validation; unknown actions and
/// methods only produce warnings in the returned report.
pub fn validate_plan(plan: &Plan) -> Result<ValidationReport, ValidationError> {
    let mut v = Validator::new();
    v.validate_plan(plan);
    v.finish()
}
