//! Report output: stdout for humans and logs, the `GITHUB_OUTPUT` file for
//! later workflow steps.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use hashnode_sync_core::report::RunReport;

/// Lines appended to the `GITHUB_OUTPUT` file: a single-line `result_json`
/// and a heredoc-style multi-line `result_summary`.
pub fn render_github_output(report: &RunReport) -> Result<String> {
    let json = report.to_json().context("Failed to serialize run report")?;
    let summary = report.summary();

    let mut delimiter = String::from("HASHNODE_SYNC_EOF");
    while summary.contains(&delimiter) {
        delimiter.push('_');
    }

    Ok(format!(
        "result_json={json}\nresult_summary<<{delimiter}\n{}\n{delimiter}\n",
        summary.trim_end()
    ))
}

/// Print the report and, when `github_output` is given, append it there too.
pub fn emit(report: &RunReport, github_output: Option<&Path>) -> Result<()> {
    let pretty = report
        .to_json_pretty()
        .context("Failed to serialize run report")?;
    println!("{pretty}");
    println!("{}", report.summary().trim_end());

    if let Some(path) = github_output {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open GITHUB_OUTPUT file {}", path.display()))?;
        file.write_all(render_github_output(report)?.as_bytes())
            .with_context(|| format!("Failed to write GITHUB_OUTPUT file {}", path.display()))?;
        info!(path = %path.display(), "Wrote workflow outputs");
    }
    Ok(())
}
