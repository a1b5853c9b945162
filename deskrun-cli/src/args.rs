use std::path::PathBuf;

use clap::Args;
use deskrun_exec::ExecMode;

use crate::output::OutputFormat;

pub const DEFAULT_AUDIT_DIR: &str = ".deskrun/audit";

#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

#[derive(Debug, Args, Clone)]
pub struct AuditDirArgs {
    /// Directory for audit logs and crash dumps.
    #[arg(long, value_name = "DIR")]
    pub audit_dir: Option<PathBuf>,
}

impl AuditDirArgs {
    pub fn dir(&self) -> PathBuf {
        self.audit_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_AUDIT_DIR))
    }
}

#[derive(Debug, Args, Clone)]
pub struct EngineArgs {
    /// live, dry-run or safe.
    #[arg(long)]
    pub mode: Option<ExecMode>,
    /// JSON or YAML engine settings; durations in milliseconds.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub retry_max_attempts: Option<u32>,
    #[arg(long)]
    pub heartbeat_timeout_ms: Option<u64>,
    /// Keep an eye on a process for the whole run (repeatable).
    #[arg(long = "watch-process", value_name = "NAME")]
    pub watch_processes: Vec<String>,
}
