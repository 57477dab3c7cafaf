//! Gate verdict: the pass/fail decision in the shape upstream status checks consume.

use gatekeep_core::PipelineResult;
use serde::{Deserialize, Serialize};

/// Gate evaluation verdict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GateVerdict {
    /// Whether the gate passed.
    pub passed: bool,

    /// One line per failed job naming the job and its failing step (empty if passed).
    pub violations: Vec<String>,

    /// Summary message.
    pub message: String,
}

/// CI gate evaluation rules.
pub struct CiGate;

impl CiGate {
    /// Evaluate a finished pipeline.
    ///
    /// Gate rule: the gate passes iff every job passed. Each failed job
    /// contributes a violation naming the job, the failing step and why.
    pub fn evaluate(result: &PipelineResult) -> GateVerdict {
        let violations: Vec<String> = result
            .failed_jobs()
            .into_iter()
            .map(|job| {
                let reason = job
                    .failure
                    .as_ref()
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "failed".to_string());
                match (job.first_failing_step, job.failing_step_label()) {
                    (Some(idx), Some(label)) => format!(
                        "Job '{}' failed at step {} ({}): {}",
                        job.job_name, idx, label, reason
                    ),
                    _ => format!("Job '{}' failed: {}", job.job_name, reason),
                }
            })
            .collect();

        let passed = result.passed() && violations.is_empty();
        let message = if passed {
            format!("All {} jobs passed", result.jobs.len())
        } else {
            format!(
                "Gate failed: {} of {} job(s) failed",
                violations.len(),
                result.jobs.len()
            )
        };

        GateVerdict {
            passed,
            violations,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gatekeep_core::{JobFailure, JobResult, StepRecord};

    fn step(index: usize, label: &str, passed: bool) -> StepRecord {
        StepRecord {
            index,
            label: label.to_string(),
            passed,
            exit_code: Some(if passed { 0 } else { 101 }),
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 5,
        }
    }

    fn job(name: &str, passed: bool) -> JobResult {
        let steps = vec![step(0, "checkout", true), step(1, &format!("cargo {name}"), passed)];
        let failure = (!passed).then_some(JobFailure::CommandExit { exit_code: 101 });
        JobResult::from_steps(name, steps, failure, Utc::now())
    }

    fn pipeline(jobs: Vec<JobResult>) -> PipelineResult {
        PipelineResult::aggregate("run", "digest", &["fmt", "clippy", "test"], jobs, Utc::now())
            .unwrap()
    }

    #[test]
    fn test_all_passed() {
        let verdict = CiGate::evaluate(&pipeline(vec![
            job("fmt", true),
            job("clippy", true),
            job("test", true),
        ]));
        assert!(verdict.passed);
        assert!(verdict.violations.is_empty());
        assert_eq!(verdict.message, "All 3 jobs passed");
    }

    #[test]
    fn test_failed_job_named_with_step() {
        let verdict = CiGate::evaluate(&pipeline(vec![
            job("fmt", true),
            job("clippy", false),
            job("test", true),
        ]));
        assert!(!verdict.passed);
        assert_eq!(verdict.violations.len(), 1);
        assert_eq!(
            verdict.violations[0],
            "Job 'clippy' failed at step 1 (cargo clippy): exited with code 101"
        );
    }

    #[test]
    fn test_failure_without_step() {
        let provisioning = JobResult::from_steps(
            "test",
            vec![],
            Some(JobFailure::Provisioning {
                message: "no capacity".to_string(),
            }),
            Utc::now(),
        );
        let verdict = CiGate::evaluate(&pipeline(vec![job("fmt", true), job("clippy", true), provisioning]));
        assert!(!verdict.passed);
        assert_eq!(
            verdict.violations[0],
            "Job 'test' failed: provisioning failed: no capacity"
        );
    }
}
