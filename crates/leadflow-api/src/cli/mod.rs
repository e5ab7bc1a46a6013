//! CLI command definitions for the `leadflow` binary.

pub mod handlers;
pub mod report;
pub mod workflow;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Run lead-generation agent pipelines from workflow files.
#[derive(Parser)]
#[command(name = "leadflow", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Detailed logs (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to leadflow.toml.
    #[arg(long, global = true, env = "LEADFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a workflow file and write its run report.
    Run {
        /// Workflow definition (.json, .yaml or .yml).
        file: PathBuf,

        /// Directory for the report (defaults to `output_dir` from config).
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Do not write the report file.
        #[arg(long)]
        no_save: bool,

        /// Keep going after a failed step regardless of the workflow's policy.
        #[arg(long)]
        continue_on_error: bool,
    },

    /// Load, validate and plan a workflow without running it.
    Validate {
        /// Workflow definition (.json, .yaml or .yml).
        file: PathBuf,
    },

    /// List registered handler names.
    Handlers,

    /// Render a saved run report.
    Show {
        /// Report JSON written by `leadflow run`.
        report: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_flags() {
        let cli = Cli::try_parse_from([
            "leadflow",
            "run",
            "workflow.json",
            "--no-save",
            "--continue-on-error",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run {
                file,
                output_dir,
                no_save,
                continue_on_error,
            } => {
                assert_eq!(file, PathBuf::from("workflow.json"));
                assert!(output_dir.is_none());
                assert!(no_save);
                assert!(continue_on_error);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["leadflow", "handlers", "--json", "--quiet"]).unwrap();
        assert!(cli.json);
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Handlers));
    }

    #[test]
    fn run_requires_file() {
        assert!(Cli::try_parse_from(["leadflow", "run"]).is_err());
    }
}
