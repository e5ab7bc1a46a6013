//! Run report rendering, shared by `run` and `show`.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use leadflow_core::workflow::report::{load_report, render_report_json};
use leadflow_types::report::{RunReport, RunStatus, StepResult};

/// Characters of preview or error shown in a table cell.
const DETAIL_CHARS: usize = 60;

/// `leadflow show <report.json>`.
pub fn show_report(path: &Path, json: bool) -> Result<()> {
    let report =
        load_report(path).with_context(|| format!("Failed to read report {}", path.display()))?;

    if json {
        println!("{}", render_report_json(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn status_cell(status: RunStatus) -> Cell {
    let color = match status {
        RunStatus::Completed => Color::Green,
        RunStatus::PartialFailure => Color::Yellow,
        RunStatus::Failed => Color::Red,
    };
    Cell::new(status.to_string().to_uppercase()).fg(color)
}

fn detail(step: &StepResult) -> String {
    let text = step
        .error
        .as_deref()
        .or(step.output_preview.as_deref())
        .unwrap_or_default();
    if text.chars().count() > DETAIL_CHARS {
        let cut: String = text.chars().take(DETAIL_CHARS).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

/// Step table for a report.
pub fn steps_table(report: &RunReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#"),
            Cell::new("Step").fg(Color::Cyan),
            Cell::new("Agent"),
            Cell::new("Status"),
            Cell::new("Duration"),
            Cell::new("Detail"),
        ]);

    for (i, step) in report.steps.iter().enumerate() {
        let status = if step.is_success() {
            Cell::new("success").fg(Color::Green)
        } else {
            Cell::new("failed").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&step.step_id),
            Cell::new(&step.agent),
            status,
            Cell::new(format!("{:.2}s", step.duration_seconds)),
            Cell::new(detail(step)),
        ]);
    }
    table
}

/// Styled summary: header, step table and any load error.
pub fn print_report(report: &RunReport) {
    let mut header = Table::new();
    header.load_preset(presets::NOTHING).add_row(vec![
        Cell::new("Workflow"),
        Cell::new(&report.workflow_name).fg(Color::Cyan),
    ]);
    header.add_row(vec![Cell::new("Status"), status_cell(report.status)]);
    header.add_row(vec![Cell::new("Run ID"), Cell::new(report.run_id)]);
    header.add_row(vec![
        Cell::new("Started"),
        Cell::new(report.start_time.to_rfc3339()),
    ]);
    header.add_row(vec![
        Cell::new("Finished"),
        Cell::new(report.end_time.to_rfc3339()),
    ]);
    header.add_row(vec![Cell::new("Steps"), Cell::new(report.steps.len())]);

    println!();
    println!("{header}");
    if !report.steps.is_empty() {
        println!();
        println!("{}", steps_table(report));
    }
    if let Some(error) = &report.error {
        println!();
        println!("  {} {}", style("error:").red().bold(), error);
    }
    println!();
}
