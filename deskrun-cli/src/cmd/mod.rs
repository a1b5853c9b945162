pub mod audit;
pub mod config;
pub mod graph;
pub mod run;
pub mod validate;

use std::path::Path;

use deskrun_core::{parse_plan_str, ParseError, ParsedPlan, PlanFormat};

use crate::exit_codes;
use crate::output::print_error;
use crate::OutputArgs;

/// Reads and parses a plan file, printing the problem and returning the exit code on error.
pub(crate) fn load_plan(path: &Path, output: &OutputArgs) -> Result<ParsedPlan, i32> {
    let content = match std::fs::read_to_string(path) {
        Ok(v) => v,
        Err(e) => {
            print_error(
                output.format,
                output.quiet,
                &format!("failed to read {}: {e}", path.display()),
            );
            return Err(exit_codes::RUNTIME_ERROR);
        }
    };

    parse_plan_str(&content, PlanFormat::Auto).map_err(|e| {
        let message = match &e {
            ParseError::Json(err) => format!("JSON parse failed: {err}"),
            ParseError::Yaml(err) => format!("YAML parse failed: {err}"),
            ParseError::UnknownFormat => "input is neither valid JSON nor valid YAML".to_string(),
        };
        print_error(output.format, output.quiet, &message);
        exit_codes::VALIDATION_FAILED
    })
}
