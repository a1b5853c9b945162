use std::path::Path;

use deskrun_core::StepGraph;

use crate::exit_codes;
use crate::output::{print_error, print_result, OutputFormat};
use crate::OutputArgs;

use super::load_plan;

pub async fn graph_cmd(path: &Path, output: OutputArgs) -> i32 {
    let parsed = match load_plan(path, &output) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let graph = match StepGraph::from_plan(&parsed.plan) {
        Ok(g) => g,
        Err(e) => {
            print_error(output.format, output.quiet, &format!("invalid graph: {e}"));
            return exit_codes::VALIDATION_FAILED;
        }
    };

    if output.quiet {
        return exit_codes::SUCCESS;
    }
    match output.format {
        OutputFormat::Dot => print!("{}", graph.to_dot(&parsed.plan.task)),
        OutputFormat::Json => print_result(output.format, output.quiet, &graph),
        OutputFormat::Text => {
            let total = graph.len();
            println!("task: {}", parsed.plan.task);
            for node in graph.nodes() {
                let deps = if node.depends_on.is_empty() {
                    "-".to_string()
                } else {
                    node.depends_on.join(", ")
                };
                println!(
                    "  {} [{}] value={:?} method={} after={} timeout={}ms retries={}{}",
                    node.label(total),
                    node.id,
                    node.value,
                    node.method,
                    deps,
                    node.timeout_ms,
                    node.max_retries,
                    node.rollback_action
                        .as_deref()
                        .map(|r| format!(" rollback={r}"))
                        .unwrap_or_default()
                );
            }
        }
    }
    exit_codes::SUCCESS
}
