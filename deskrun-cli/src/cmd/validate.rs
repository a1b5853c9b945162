use std::path::Path;

use deskrun_core::validate_plan;
use serde::Serialize;

use crate::exit_codes;
use crate::output::{print_result, OutputFormat};
use crate::OutputArgs;

use super::load_plan;

#[derive(Serialize)]
struct ValidateResult {
    valid: bool,
    format: String,
    steps: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

pub async fn validate_cmd(path: &Path, output: OutputArgs) -> i32 {
    let parsed = match load_plan(path, &output) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let text = output.format == OutputFormat::Text && !output.quiet;

    match validate_plan(&parsed.plan) {
        Ok(report) => {
            let warnings: Vec<String> = report.warnings.iter().map(|w| w.to_string()).collect();
            if text {
                println!(
                    "ok: valid plan '{}' ({:?}, {} steps)",
                    parsed.plan.task,
                    parsed.format,
                    parsed.plan.steps.len()
                );
                for w in &warnings {
                    eprintln!("warning: {w}");
                }
            } else {
                let result = ValidateResult {
                    valid: true,
                    format: format!("{:?}", parsed.format),
                    steps: parsed.plan.steps.len(),
                    errors: vec![],
                    warnings,
                };
                print_result(output.format, output.quiet, &result);
            }
            exit_codes::SUCCESS
        }
        Err(err) => {
            let errors = err.messages();
            if text {
                eprintln!("error: validation failed");
                for e in &errors {
                    eprintln!("- {e}");
                }
            } else {
                let result = ValidateResult {
                    valid: false,
                    format: format!("{:?}", parsed.format),
                    steps: parsed.plan.steps.len(),
                    errors,
                    warnings: vec![],
                };
                print_result(output.format, output.quiet, &result);
            }
            exit_codes::VALIDATION_FAILED
        }
    }
}
