//! Pipeline report artifacts.
//!
//! Two renderings of a finished run for the host to surface:
//! - Markdown summary (job table plus failure details), suitable for a
//!   step-summary file or a pull-request comment
//! - JSON document carrying the full `PipelineResult` and the gate verdict

use crate::error::Result;
use crate::gate::{CiGate, GateVerdict};
use gatekeep_core::{Event, PipelineResult};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Lines of step output kept in the Markdown failure details.
const OUTPUT_TAIL_LINES: usize = 20;

/// A finished run plus the event that triggered it.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport<'a> {
    pub pipeline: &'a str,
    pub event: &'a Event,
    pub result: &'a PipelineResult,
    pub verdict: GateVerdict,
}

impl<'a> PipelineReport<'a> {
    pub fn new(pipeline: &'a str, event: &'a Event, result: &'a PipelineResult) -> Self {
        Self {
            pipeline,
            event,
            result,
            verdict: CiGate::evaluate(result),
        }
    }

    /// Render the report as a Markdown string.
    pub fn render_markdown(&self) -> String {
        let status = if self.verdict.passed { "PASSED" } else { "FAILED" };
        let mut md = format!("# {}: {}\n\n", self.pipeline, status);
        md.push_str(&format!("- Event: `{}`\n", self.event));
        md.push_str(&format!("- Run: `{}`\n", self.result.run_id));
        md.push_str(&format!("- Duration: {}ms\n", self.result.duration_ms));
        md.push_str(&format!("- {}\n", self.verdict.message));

        md.push_str("\n## Jobs\n\n");
        md.push_str("| Job | Outcome | Failing step | Duration |\n");
        md.push_str("|-----|---------|--------------|----------|\n");
        for job in &self.result.jobs {
            let failing = match (job.first_failing_step, job.failing_step_label()) {
                (Some(idx), Some(label)) => format!("{idx}: `{label}`"),
                _ if !job.passed() => "-".to_string(),
                _ => String::new(),
            };
            md.push_str(&format!(
                "| {} | {} | {} | {}ms |\n",
                job.job_name, job.outcome, failing, job.duration_ms
            ));
        }

        if !self.verdict.violations.is_empty() {
            md.push_str("\n## Failures\n\n");
            for violation in &self.verdict.violations {
                md.push_str(&format!("- {violation}\n"));
            }

            for job in self.result.failed_jobs() {
                let Some(step) = job
                    .first_failing_step
                    .and_then(|idx| job.steps.iter().find(|s| s.index == idx))
                else {
                    continue;
                };
                let output = tail(&format!("{}{}", step.stdout, step.stderr), OUTPUT_TAIL_LINES);
                if output.is_empty() {
                    continue;
                }
                md.push_str(&format!("\n### {}\n\n```text\n{}\n```\n", job.job_name, output));
            }
        }

        md
    }

    pub fn render_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Append the Markdown rendering to a summary file, creating it if needed.
    pub fn append_markdown_to(&self, path: &Path) -> Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        file.write_all(self.render_markdown().as_bytes())?;
        Ok(())
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
