use std::path::PathBuf;

use clap::Subcommand;

use crate::args::*;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse and validate a plan.
    Validate {
        path: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Print the step dependency graph of a plan.
    Graph {
        path: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Execute a plan.
    Run {
        path: PathBuf,
        #[command(flatten)]
        engine: EngineArgs,
        #[command(flatten)]
        audit: AuditDirArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Inspect stored crash dumps.
    Audit {
        #[command(subcommand)]
        action: AuditCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum AuditCommand {
    List {
        #[command(flatten)]
        audit: AuditDirArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    Show {
        task_id: String,
        /// Print the full event log instead of the crash dump.
        #[arg(long)]
        log: bool,
        #[command(flatten)]
        audit: AuditDirArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
}
