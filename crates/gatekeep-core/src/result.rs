//! Job and pipeline results, and the gating aggregation.

use crate::error::{GatekeepError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Pass/fail outcome of a job or a whole pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail,
}

impl Outcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Pass)
    }

    pub fn from_success(success: bool) -> Self {
        if success {
            Outcome::Pass
        } else {
            Outcome::Fail
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass => f.write_str("pass"),
            Outcome::Fail => f.write_str("fail"),
        }
    }
}

/// Why a job failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum JobFailure {
    /// The host could not provide an environment; no step ran.
    Provisioning { message: String },

    /// Fetching the repository snapshot failed.
    Checkout { message: String },

    /// A command step exited nonzero.
    CommandExit { exit_code: i32 },

    /// A command step could not be run to completion (spawn error, timeout).
    CommandError { message: String },

    /// The job task itself died before producing a result.
    Aborted { message: String },
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobFailure::Provisioning { message } => write!(f, "provisioning failed: {message}"),
            JobFailure::Checkout { message } => write!(f, "checkout failed: {message}"),
            JobFailure::CommandExit { exit_code } => write!(f, "exited with code {exit_code}"),
            JobFailure::CommandError { message } => write!(f, "command error: {message}"),
            JobFailure::Aborted { message } => write!(f, "aborted: {message}"),
        }
    }
}

/// Record of one executed step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepRecord {
    /// Position of the step in the job (0-based).
    pub index: usize,

    pub label: String,

    pub passed: bool,

    /// Exit code of command steps; `None` for checkout or when no process ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stdout: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr: String,

    pub duration_ms: u64,
}

/// Outcome of a single job. Built once when the job finishes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobResult {
    pub job_name: String,

    pub outcome: Outcome,

    /// Index of the step that failed, if a step failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_failing_step: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<JobFailure>,

    /// Steps that actually ran, in order.
    pub steps: Vec<StepRecord>,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,

    pub duration_ms: u64,
}

impl JobResult {
    /// Build a result from the executed steps.
    ///
    /// The job passes iff every step passed and no failure was recorded.
    pub fn from_steps(
        job_name: impl Into<String>,
        steps: Vec<StepRecord>,
        failure: Option<JobFailure>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let finished_at = Utc::now();
        let first_failing_step = steps.iter().find(|s| !s.passed).map(|s| s.index);
        let outcome = Outcome::from_success(failure.is_none() && first_failing_step.is_none());
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;

        Self {
            job_name: job_name.into(),
            outcome,
            first_failing_step,
            failure,
            steps,
            started_at,
            finished_at,
            duration_ms,
        }
    }

    /// Result for a job whose task died without reporting.
    pub fn aborted(job_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::from_steps(
            job_name,
            Vec::new(),
            Some(JobFailure::Aborted {
                message: message.into(),
            }),
            Utc::now(),
        )
    }

    pub fn passed(&self) -> bool {
        self.outcome.is_pass()
    }

    /// Label of the failing step, if any.
    pub fn failing_step_label(&self) -> Option<&str> {
        let idx = self.first_failing_step?;
        self.steps
            .iter()
            .find(|s| s.index == idx)
            .map(|s| s.label.as_str())
    }
}

/// Aggregate result of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineResult {
    pub run_id: String,

    pub outcome: Outcome,

    /// One result per job, in definition order.
    pub jobs: Vec<JobResult>,

    /// Digest of the pipeline definition that produced this run.
    pub definition_digest: String,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,

    pub duration_ms: u64,
}

impl PipelineResult {
    /// Gate a complete set of job results.
    ///
    /// `expected` lists every job of the job set in definition order. Fails
    /// with `IncompleteRun` if any job has no result and with
    /// `UnexpectedJobResult` for duplicates or results of unknown jobs, so a
    /// pipeline outcome is never derived from a partial set. Completion order
    /// of `results` does not matter.
    pub fn aggregate(
        run_id: impl Into<String>,
        definition_digest: impl Into<String>,
        expected: &[&str],
        results: Vec<JobResult>,
        started_at: DateTime<Utc>,
    ) -> Result<Self> {
        let mut by_name: HashMap<String, JobResult> = HashMap::with_capacity(results.len());
        for result in results {
            if !expected.contains(&result.job_name.as_str()) {
                return Err(GatekeepError::UnexpectedJobResult(format!(
                    "unknown job '{}'",
                    result.job_name
                )));
            }
            if by_name.contains_key(&result.job_name) {
                return Err(GatekeepError::UnexpectedJobResult(format!(
                    "duplicate result for job '{}'",
                    result.job_name
                )));
            }
            by_name.insert(result.job_name.clone(), result);
        }

        let missing: Vec<&str> = expected
            .iter()
            .copied()
            .filter(|name| !by_name.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            return Err(GatekeepError::IncompleteRun(missing.join(", ")));
        }

        let jobs: Vec<JobResult> = expected
            .iter()
            .filter_map(|name| by_name.remove(*name))
            .collect();
        let outcome = Outcome::from_success(jobs.iter().all(JobResult::passed));

        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;

        Ok(Self {
            run_id: run_id.into(),
            outcome,
            jobs,
            definition_digest: definition_digest.into(),
            started_at,
            finished_at,
            duration_ms,
        })
    }

    pub fn passed(&self) -> bool {
        self.outcome.is_pass()
    }

    /// Number of jobs that passed.
    pub fn passed_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.passed()).count()
    }

    /// Number of jobs that failed.
    pub fn failed_count(&self) -> usize {
        self.jobs.iter().filter(|j| !j.passed()).count()
    }

    /// Failed jobs, in definition order.
    pub fn failed_jobs(&self) -> Vec<&JobResult> {
        self.jobs.iter().filter(|j| !j.passed()).collect()
    }

    pub fn job(&self, name: &str) -> Option<&JobResult> {
        self.jobs.iter().find(|j| j.job_name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOBS: [&str; 3] = ["fmt", "clippy", "test"];

    fn step(index: usize, passed: bool) -> StepRecord {
        StepRecord {
            index,
            label: format!("step-{index}"),
            passed,
            exit_code: Some(if passed { 0 } else { 1 }),
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 1,
        }
    }

    fn job(name: &str, passed: bool) -> JobResult {
        let failure = (!passed).then_some(JobFailure::CommandExit { exit_code: 1 });
        JobResult::from_steps(name, vec![step(0, true), step(1, passed)], failure, Utc::now())
    }

    fn aggregate(results: Vec<JobResult>) -> Result<PipelineResult> {
        PipelineResult::aggregate("run-1", "digest", &JOBS, results, Utc::now())
    }

    #[test]
    fn test_job_result_first_failing_step() {
        let result = job("fmt", false);
        assert_eq!(result.outcome, Outcome::Fail);
        assert_eq!(result.first_failing_step, Some(1));
        assert_eq!(result.failing_step_label(), Some("step-1"));

        let result = job("fmt", true);
        assert!(result.passed());
        assert_eq!(result.first_failing_step, None);
        assert_eq!(result.failing_step_label(), None);
    }

    #[test]
    fn test_job_result_failure_without_step() {
        let result = JobResult::from_steps(
            "fmt",
            vec![],
            Some(JobFailure::Provisioning {
                message: "no capacity".to_string(),
            }),
            Utc::now(),
        );
        assert!(!result.passed());
        assert_eq!(result.first_failing_step, None);
    }

    #[test]
    fn test_aborted_job_fails() {
        let result = JobResult::aborted("test", "task panicked");
        assert!(!result.passed());
        assert!(matches!(result.failure, Some(JobFailure::Aborted { .. })));
    }

    #[test]
    fn test_all_pass_gates_pass() {
        let result = aggregate(vec![job("fmt", true), job("clippy", true), job("test", true)]).unwrap();
        assert!(result.passed());
        assert_eq!(result.passed_count(), 3);
        assert!(result.failed_jobs().is_empty());
    }

    #[test]
    fn test_any_failure_gates_fail() {
        for failing in JOBS {
            let results = JOBS.iter().map(|name| job(name, *name != failing)).collect();
            let result = aggregate(results).unwrap();
            assert_eq!(result.outcome, Outcome::Fail, "failing job {failing}");
            let failed: Vec<&str> = result.failed_jobs().iter().map(|j| j.job_name.as_str()).collect();
            assert_eq!(failed, vec![failing]);
        }
    }

    #[test]
    fn test_completion_order_does_not_matter() {
        let forward = aggregate(vec![job("fmt", true), job("clippy", false), job("test", true)]).unwrap();
        let reversed = aggregate(vec![job("test", true), job("clippy", false), job("fmt", true)]).unwrap();

        assert_eq!(forward.outcome, reversed.outcome);
        let names = |r: &PipelineResult| r.jobs.iter().map(|j| j.job_name.clone()).collect::<Vec<_>>();
        assert_eq!(names(&forward), vec!["fmt", "clippy", "test"]);
        assert_eq!(names(&forward), names(&reversed));
    }

    #[test]
    fn test_partial_results_rejected() {
        let err = aggregate(vec![job("fmt", true), job("test", true)]).unwrap_err();
        match err {
            GatekeepError::IncompleteRun(missing) => assert_eq!(missing, "clippy"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_and_unknown_results_rejected() {
        let dup = aggregate(vec![
            job("fmt", true),
            job("fmt", true),
            job("clippy", true),
            job("test", true),
        ]);
        assert!(matches!(dup, Err(GatekeepError::UnexpectedJobResult(_))));

        let unknown = aggregate(vec![
            job("fmt", true),
            job("clippy", true),
            job("test", true),
            job("docs", true),
        ]);
        assert!(matches!(unknown, Err(GatekeepError::UnexpectedJobResult(_))));
    }

    #[test]
    fn test_job_failure_display() {
        assert_eq!(
            JobFailure::CommandExit { exit_code: 101 }.to_string(),
            "exited with code 101"
        );
        assert_eq!(
            JobFailure::Checkout {
                message: "network unreachable".to_string()
            }
            .to_string(),
            "checkout failed: network unreachable"
        );
    }
}
