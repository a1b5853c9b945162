use deskrun_store::{AuditStore, FileAuditStore};
use serde::Serialize;

use crate::exit_codes;
use crate::output::{print_error, print_result, OutputFormat};
use crate::{AuditDirArgs, OutputArgs};

#[derive(Serialize)]
struct ListResult {
    dir: String,
    crash_dumps: Vec<String>,
}

pub async fn list_cmd(audit: AuditDirArgs, output: OutputArgs) -> i32 {
    let store = FileAuditStore::new(audit.dir());
    let ids = match store.list_crash_dumps().await {
        Ok(ids) => ids,
        Err(e) => {
            print_error(output.format, output.quiet, &e.to_string());
            return exit_codes::RUNTIME_ERROR;
        }
    };

    if output.format == OutputFormat::Text && !output.quiet {
        if ids.is_empty() {
            println!("no crash dumps in {}", store.dir().display());
        }
        for id in &ids {
            println!("{id}");
        }
    } else {
        let result = ListResult {
            dir: store.dir().display().to_string(),
            crash_dumps: ids,
        };
        print_result(output.format, output.quiet, &result);
    }
    exit_codes::SUCCESS
}

pub async fn show_cmd(task_id: &str, log: bool, audit: AuditDirArgs, output: OutputArgs) -> i32 {
    let store = FileAuditStore::new(audit.dir());
    let shown = if log {
        store.load_log(task_id).await.map(|l| l.map(|l| serde_json::to_value(l)))
    } else {
        store
            .load_crash_dump(task_id)
            .await
            .map(|d| d.map(|d| serde_json::to_value(d)))
    };

    match shown {
        Ok(Some(Ok(value))) => {
            print_result(output.format, output.quiet, &value);
            exit_codes::SUCCESS
        }
        Ok(Some(Err(e))) => {
            print_error(output.format, output.quiet, &e.to_string());
            exit_codes::RUNTIME_ERROR
        }
        Ok(None) => {
            let what = if log { "audit log" } else { "crash dump" };
            print_error(
                output.format,
                output.quiet,
                &format!("no {what} for '{task_id}' in {}", store.dir().display()),
            );
            exit_codes::VALIDATION_FAILED
        }
        Err(e) => {
            print_error(output.format, output.quiet, &e.to_string());
            exit_codes::RUNTIME_ERROR
        }
    }
}
