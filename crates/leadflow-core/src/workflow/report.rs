//! Run report logging and persistence.

use std::path::{Path, PathBuf};

use leadflow_types::report::RunReport;

use super::definition::WorkflowError;

/// Log a human-readable run summary at info level.
pub fn log_summary(report: &RunReport) {
    tracing::info!("workflow: {}", report.workflow_name);
    tracing::info!("status: {}", report.status.to_string().to_uppercase());
    tracing::info!("start: {}", report.start_time.to_rfc3339());
    tracing::info!("end: {}", report.end_time.to_rfc3339());
    tracing::info!("steps executed: {}", report.steps.len());
    if let Some(error) = &report.error {
        tracing::info!("error: {error}");
    }
    for step in &report.steps {
        let marker = if step.is_success() { "SUCCESS" } else { "FAILED" };
        match &step.error {
            Some(error) => tracing::info!(
                "[{marker}] {} ({}) {:.2}s: {error}",
                step.step_id,
                step.agent,
                step.duration_seconds
            ),
            None => tracing::info!(
                "[{marker}] {} ({}) {:.2}s",
                step.step_id,
                step.agent,
                step.duration_seconds
            ),
        }
    }
}

/// Pretty JSON rendering of a report.
pub fn render_report_json(report: &RunReport) -> Result<String, WorkflowError> {
    serde_json::to_string_pretty(report).map_err(|e| WorkflowError::Report(e.to_string()))
}

/// File name a report is saved under:
/// `execution_results_<YYYYmmdd_HHMMSS>_<run id tail>.json`.
///
/// The suffix is the random tail of the run id, so runs ending in the same
/// second do not overwrite each other.
pub fn report_file_name(report: &RunReport) -> String {
    let id = report.run_id.simple().to_string();
    format!(
        "execution_results_{}_{}.json",
        report.end_time.format("%Y%m%d_%H%M%S"),
        &id[id.len() - 8..]
    )
}

/// Write `report` into `dir` (created if needed) and return the file path.
pub fn save_report(dir: &Path, report: &RunReport) -> Result<PathBuf, WorkflowError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(report_file_name(report));
    std::fs::write(&path, render_report_json(report)?)?;
    tracing::info!(path = %path.display(), "saved run report");
    Ok(path)
}

/// Read a report previously written by `save_report`.
pub fn load_report(path: &Path) -> Result<RunReport, WorkflowError> {
    if !path.exists() {
        return Err(WorkflowError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| WorkflowError::Report(e.to_string()))
}
