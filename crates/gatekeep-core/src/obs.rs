//! Structured observability hooks for the pipeline lifecycle.
//!
//! Provides a run-scoped span and one emitter per lifecycle event:
//! skipped, started, job started, step finished, job finished, finished.
//! Events are emitted at `info!` (failures at `warn!`); filter with `RUST_LOG`.

use crate::event::Event;
use crate::result::{JobResult, PipelineResult, StepRecord};
use tracing::{info, warn};

/// Span carrying `run_id` for everything logged during one pipeline run.
///
/// ```ignore
/// coordinator_work().instrument(run_span(&run_id)).await;
/// ```
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("gatekeep.run", run_id = %run_id)
}

/// Event did not match any trigger rule.
pub fn emit_pipeline_skipped(pipeline: &str, event: &Event) {
    info!(
        event = "pipeline.skipped",
        pipeline = %pipeline,
        kind = %event.kind,
        branch = %event.target_branch,
    );
}

pub fn emit_pipeline_started(run_id: &str, pipeline: &str, event: &Event, job_count: usize) {
    info!(
        event = "pipeline.started",
        run_id = %run_id,
        pipeline = %pipeline,
        kind = %event.kind,
        branch = %event.target_branch,
        jobs = job_count,
    );
}

pub fn emit_job_started(job: &str, runs_on: &str) {
    info!(event = "job.started", job = %job, runs_on = %runs_on);
}

pub fn emit_step_finished(job: &str, step: &StepRecord) {
    if step.passed {
        info!(
            event = "step.finished",
            job = %job,
            index = step.index,
            step = %step.label,
            duration_ms = step.duration_ms,
            passed = true,
        );
    } else {
        warn!(
            event = "step.finished",
            job = %job,
            index = step.index,
            step = %step.label,
            exit_code = ?step.exit_code,
            duration_ms = step.duration_ms,
            passed = false,
        );
    }
}

pub fn emit_job_finished(result: &JobResult) {
    match &result.failure {
        None => info!(
            event = "job.finished",
            job = %result.job_name,
            outcome = %result.outcome,
            duration_ms = result.duration_ms,
        ),
        Some(failure) => warn!(
            event = "job.finished",
            job = %result.job_name,
            outcome = %result.outcome,
            failing_step = ?result.first_failing_step,
            failure = %failure,
            duration_ms = result.duration_ms,
        ),
    }
}

pub fn emit_pipeline_finished(result: &PipelineResult) {
    let failed: Vec<&str> = result
        .failed_jobs()
        .into_iter()
        .map(|j| j.job_name.as_str())
        .collect();
    info!(
        event = "pipeline.finished",
        run_id = %result.run_id,
        outcome = %result.outcome,
        passed = result.passed_count(),
        failed = ?failed,
        duration_ms = result.duration_ms,
    );
}
