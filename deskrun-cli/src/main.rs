use clap::Parser;

mod args;
mod backend;
mod cmd;
mod commands;
mod exit_codes;
mod logging;
mod output;

pub use args::*;
use commands::{AuditCommand, Command};

#[derive(Debug, Parser)]
#[command(name = "deskrun", version, about = "Desktop automation plan runner")]
struct Cli {
    /// More diagnostics on stderr (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {e}");
            std::process::exit(exit_codes::RUNTIME_ERROR);
        }
    };

    let exit_code = rt.block_on(run_command(cli.command));
    std::process::exit(exit_code);
}

async fn run_command(command: Command) -> i32 {
    match command {
        Command::Validate { path, output } => cmd::validate::validate_cmd(&path, output).await,
        Command::Graph { path, output } => cmd::graph::graph_cmd(&path, output).await,
        Command::Run {
            path,
            engine,
            audit,
            output,
        } => cmd::run::run_cmd(&path, engine, audit, output).await,
        Command::Audit { action } => match action {
            AuditCommand::List { audit, output } => cmd::audit::list_cmd(audit, output).await,
            AuditCommand::Show {
                task_id,
                log,
                audit,
                output,
            } => cmd::audit::show_cmd(&task_id, log, audit, output).await,
        },
    }
}
