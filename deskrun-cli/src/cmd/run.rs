use std::path::Path;
use std::sync::Arc;

use deskrun_core::validate_plan;
use deskrun_exec::executor::BackendRegistry;
use deskrun_exec::{
    MetricsCollector, MetricsEventSink, Orchestrator, ProcProbe, TaskResult, TracingEventSink,
};
use deskrun_store::FileAuditStore;
use serde::Serialize;

use crate::backend::ShellBackend;
use crate::exit_codes;
use crate::output::{print_error, print_result, OutputFormat};
use crate::{AuditDirArgs, EngineArgs, OutputArgs};

use super::config::build_engine_config;
use super::load_plan;

#[derive(Serialize)]
struct RunOutput<'a> {
    #[serde(flatten)]
    result: &'a TaskResult,
    metrics: serde_json::Value,
}

pub async fn run_cmd(path: &Path, engine: EngineArgs, audit: AuditDirArgs, output: OutputArgs) -> i32 {
    let parsed = match load_plan(path, &output) {
        Ok(p) => p,
        Err(code) => return code,
    };
    if let Err(err) = validate_plan(&parsed.plan) {
        print_error(
            output.format,
            output.quiet,
            &format!("invalid plan: {}", err.messages().join("; ")),
        );
        return exit_codes::VALIDATION_FAILED;
    }

    let resolved = match build_engine_config(&engine) {
        Ok(c) => c,
        Err(e) => {
            print_error(output.format, output.quiet, &e);
            return exit_codes::RUNTIME_ERROR;
        }
    };

    let registry = Arc::new(BackendRegistry::new().with(Arc::new(ShellBackend::new())));
    let collector = Arc::new(MetricsCollector::new());
    let sink = Arc::new(MetricsEventSink::new(
        collector.clone(),
        Arc::new(TracingEventSink),
    ));
    let store = Arc::new(FileAuditStore::new(audit.dir()));

    let mut orchestrator = Orchestrator::new(resolved.engine, registry)
        .with_event_sink(sink)
        .with_audit_store(store)
        .with_system_probe(Arc::new(ProcProbe::new()));
    for name in resolved.watch_processes {
        orchestrator = orchestrator.with_watched_process(name);
    }

    let result = orchestrator.run(&parsed.plan).await;
    let metrics = collector.get_metrics().await;

    if output.format == OutputFormat::Text && !output.quiet {
        println!("{result}");
        for intent in &result.dry_run {
            println!("  would run {} {:?} via {}", intent.action, intent.value, intent.method);
        }
        for rb in &result.rollbacks {
            let status = if rb.success { "ok" } else { "failed" };
            println!("  rollback {} {:?} for {}: {status}", rb.action, rb.value, rb.source_step);
        }
        if let Some(class) = result.error_class {
            println!("  error class: {class}");
        }
        if let Some(dump) = &result.crash_dump {
            println!("  crash dump: {dump}");
        }
    } else {
        let out = RunOutput {
            result: &result,
            metrics: metrics.to_json(),
        };
        print_result(output.format, output.quiet, &out);
    }

    if result.success {
        exit_codes::SUCCESS
    } else {
        exit_codes::RUN_FAILED
    }
}
