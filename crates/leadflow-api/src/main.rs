//! Leadflow CLI entry point.
//!
//! Binary name: `leadflow`
//!
//! Parses arguments, sets up tracing, loads configuration and registers the
//! built-in handlers, then dispatches to the subcommand.
//!
//! Exit codes: `0` completed, `1` partial failure, `2` the workflow (or the
//! command itself) failed before any step ran.

mod cli;
mod state;

use std::process::ExitCode;

use clap::Parser;
use console::style;
use leadflow_observe::tracing_setup::{init_tracing, shutdown_tracing, verbosity_filter};

use cli::workflow::{OutputMode, RunOptions};
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = verbosity_filter(cli.quiet, cli.verbose);
    if let Err(e) = init_tracing(filter, cli.json, cli.otel) {
        eprintln!("Warning: failed to initialize tracing: {e}");
    }

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", style("error:").red().bold());
            ExitCode::from(2)
        }
    };

    shutdown_tracing();
    code
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    let mode = OutputMode::from_flags(cli.json, cli.quiet);
    let state = AppState::init(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Run {
            file,
            output_dir,
            no_save,
            continue_on_error,
        } => {
            let opts = RunOptions {
                file,
                output_dir,
                no_save,
                continue_on_error,
            };
            cli::workflow::run_workflow(&state, opts, mode).await
        }

        Commands::Validate { file } => cli::workflow::validate_workflow(&state, &file, mode),

        Commands::Handlers => {
            cli::handlers::list_handlers(&state, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Show { report } => {
            cli::report::show_report(&report, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
