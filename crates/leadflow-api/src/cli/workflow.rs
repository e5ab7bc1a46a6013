//! `leadflow run` and `leadflow validate`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use leadflow_core::workflow::report::{log_summary, render_report_json, save_report};
use leadflow_core::workflow::{ExecutionPlan, ExecutionResult, load_workflow_file};
use leadflow_types::event::{LogLevel, PipelineEvent};
use leadflow_types::report::RunStatus;

use crate::state::AppState;

/// How much of the run to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Styled,
    Json,
    Quiet,
}

impl OutputMode {
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if json {
            OutputMode::Json
        } else if quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Styled
        }
    }
}

/// Process exit code for a finished run.
pub fn exit_code(status: RunStatus) -> ExitCode {
    match status {
        RunStatus::Completed => ExitCode::SUCCESS,
        RunStatus::PartialFailure => ExitCode::from(1),
        RunStatus::Failed => ExitCode::from(2),
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

pub struct RunOptions {
    pub file: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub no_save: bool,
    pub continue_on_error: bool,
}

pub async fn run_workflow(state: &AppState, opts: RunOptions, mode: OutputMode) -> Result<ExitCode> {
    let executor = state.executor(opts.continue_on_error);
    let mut rx = state.events.subscribe();

    let run = executor.run_file(&opts.file);
    tokio::pin!(run);

    // Print events as they arrive, then drain what is left once the run ends.
    let result: ExecutionResult = loop {
        tokio::select! {
            biased;
            event = rx.recv() => match event {
                Ok(event) => print_event(&event, mode),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "event printer lagged");
                }
                Err(RecvError::Closed) => break (&mut run).await,
            },
            result = &mut run => {
                drain(&mut rx, mode);
                break result;
            }
        }
    };

    log_summary(&result.report);

    let saved = if opts.no_save {
        None
    } else {
        let dir = opts
            .output_dir
            .unwrap_or_else(|| state.config.output_dir.clone());
        Some(save_report(&dir, &result.report).context("Failed to save run report")?)
    };

    match mode {
        OutputMode::Json => println!("{}", render_report_json(&result.report)?),
        OutputMode::Styled => {
            super::report::print_report(&result.report);
            if let Some(path) = &saved {
                println!("  Report saved to {}", style(path.display()).dim());
                println!();
            }
        }
        OutputMode::Quiet => {
            if let Some(error) = &result.report.error {
                eprintln!("error: {error}");
            }
        }
    }

    Ok(exit_code(result.report.status))
}

fn drain(rx: &mut Receiver<PipelineEvent>, mode: OutputMode) {
    loop {
        match rx.try_recv() {
            Ok(event) => print_event(&event, mode),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

fn level_tag(level: LogLevel) -> String {
    match level {
        LogLevel::Info => style("INFO").blue().to_string(),
        LogLevel::Success => style("SUCCESS").green().to_string(),
        LogLevel::Warning => style("WARNING").yellow().to_string(),
        LogLevel::Error => style("ERROR").red().to_string(),
    }
}

/// Live progress line for one event. Only styled mode prints.
fn print_event(event: &PipelineEvent, mode: OutputMode) {
    if mode != OutputMode::Styled {
        return;
    }
    match event {
        PipelineEvent::WorkflowStarted {
            workflow_name,
            total_steps,
            ..
        } => {
            println!();
            println!(
                "  {} Running '{}' ({} steps)",
                style("*").green().bold(),
                style(workflow_name).cyan(),
                total_steps
            );
        }
        PipelineEvent::StepStarted {
            step_id,
            agent,
            index,
            total,
            ..
        } => {
            println!();
            println!(
                "  {} {} {}",
                style(format!("[{index}/{total}]")).bold(),
                style(step_id).cyan(),
                style(format!("({agent})")).dim()
            );
        }
        PipelineEvent::HandlerLog { level, message, .. } => {
            println!("    [{}] {}", level_tag(*level), message);
        }
        PipelineEvent::PlaceholderUnresolved { placeholder, .. } => {
            println!(
                "    [{}] unresolved placeholder {}",
                level_tag(LogLevel::Warning),
                placeholder
            );
        }
        PipelineEvent::StepCompleted { duration_ms, .. } => {
            println!("    {} done in {duration_ms}ms", style("✓").green());
        }
        PipelineEvent::StepFailed {
            error,
            will_continue,
            ..
        } => {
            let next = if *will_continue { "continuing" } else { "stopping" };
            println!("    {} {error} ({next})", style("✗").red());
        }
        PipelineEvent::WorkflowFinished { .. } => {}
    }
}

// ---------------------------------------------------------------------------
// Validate
// ---------------------------------------------------------------------------

pub fn validate_workflow(state: &AppState, file: &Path, mode: OutputMode) -> Result<ExitCode> {
    let def = load_workflow_file(file)
        .with_context(|| format!("Failed to load workflow {}", file.display()))?;
    let plan = state
        .executor(false)
        .prepare(&def)
        .context("Workflow validation failed")?;

    let unknown: Vec<&str> = def
        .steps
        .iter()
        .map(|s| s.handler_name.as_str())
        .filter(|agent| !state.registry.contains(agent))
        .collect();

    match mode {
        OutputMode::Json => {
            let out = serde_json::json!({
                "workflow_name": def.name,
                "valid": true,
                "plan": plan,
                "unknown_handlers": unknown,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputMode::Styled => {
            println!();
            println!(
                "  {} '{}' is valid",
                style("*").green().bold(),
                style(&def.name).cyan()
            );
            println!();
            println!("{}", plan_table(&plan, state));
            for agent in &unknown {
                println!(
                    "  {} no handler registered for '{agent}'",
                    style("warning:").yellow().bold()
                );
            }
            println!();
        }
        OutputMode::Quiet => {}
    }

    Ok(ExitCode::SUCCESS)
}

fn plan_table(plan: &ExecutionPlan, state: &AppState) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#"),
            Cell::new("Step").fg(Color::Cyan),
            Cell::new("Agent"),
            Cell::new("Depends on"),
            Cell::new("Depth"),
        ]);

    for (i, step) in plan.steps.iter().enumerate() {
        let agent = if state.registry.contains(&step.agent) {
            Cell::new(&step.agent)
        } else {
            Cell::new(&step.agent).fg(Color::Yellow)
        };
        let deps = if step.dependencies.is_empty() {
            "-".to_string()
        } else {
            step.dependencies.join(", ")
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&step.id),
            agent,
            Cell::new(deps),
            Cell::new(step.depth),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadflow_types::config::LeadflowConfig;

    fn state() -> AppState {
        AppState::from_config(LeadflowConfig {
            seed: Some(7),
            ..LeadflowConfig::default()
        })
    }

    const WORKFLOW: &str = r#"{
        "workflow_name": "cli-demo",
        "steps": [
            {"id": "search", "agent": "ProspectSearchAgent", "instructions": "",
             "inputs": {"industry": "SaaS", "location": "USA",
                        "employee_count": {"min": 100, "max": 1000}, "signals": []}},
            {"id": "score", "agent": "ScoringAgent", "instructions": "",
             "inputs": {"leads": "{{search.output.leads}}"}}
        ]
    }"#;

    #[test]
    fn exit_codes_follow_status() {
        assert_eq!(exit_code(RunStatus::Completed), ExitCode::SUCCESS);
        assert_eq!(exit_code(RunStatus::PartialFailure), ExitCode::from(1));
        assert_eq!(exit_code(RunStatus::Failed), ExitCode::from(2));
    }

    #[test]
    fn output_mode_json_wins() {
        assert_eq!(OutputMode::from_flags(true, true), OutputMode::Json);
        assert_eq!(OutputMode::from_flags(false, true), OutputMode::Quiet);
        assert_eq!(OutputMode::from_flags(false, false), OutputMode::Styled);
    }

    #[tokio::test]
    async fn run_saves_report() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("demo.json");
        std::fs::write(&file, WORKFLOW).unwrap();
        let out = dir.path().join("reports");

        let code = run_workflow(
            &state(),
            RunOptions {
                file,
                output_dir: Some(out.clone()),
                no_save: false,
                continue_on_error: false,
            },
            OutputMode::Quiet,
        )
        .await
        .unwrap();

        assert_eq!(code, ExitCode::SUCCESS);
        let saved: Vec<_> = std::fs::read_dir(&out).unwrap().collect();
        assert_eq!(saved.len(), 1);
    }

    #[tokio::test]
    async fn missing_file_exits_with_failure_code() {
        let dir = tempfile::tempdir().unwrap();
        let code = run_workflow(
            &state(),
            RunOptions {
                file: dir.path().join("absent.json"),
                output_dir: None,
                no_save: true,
                continue_on_error: false,
            },
            OutputMode::Quiet,
        )
        .await
        .unwrap();
        assert_eq!(code, ExitCode::from(2));
    }

    #[test]
    fn validate_accepts_and_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        std::fs::write(&good, WORKFLOW).unwrap();
        assert_eq!(
            validate_workflow(&state(), &good, OutputMode::Quiet).unwrap(),
            ExitCode::SUCCESS
        );

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"workflow_name": "x", "steps": []}"#).unwrap();
        assert!(validate_workflow(&state(), &bad, OutputMode::Quiet).is_err());
    }
}
