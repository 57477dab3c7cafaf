//! Job execution: provision, run steps in order, stop at the first failure.

use crate::checkout::{SourceFetcher, SourceRef};
use crate::process::{CommandSpec, ProcessRunner};
use crate::provision::{ProvisionedEnv, Provisioner};
use chrono::Utc;
use gatekeep_core::obs;
use gatekeep_core::{Job, JobFailure, JobResult, Step, StepRecord};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Runs single jobs against the host's collaborators.
///
/// Stateless between jobs: every call provisions its own environment, so
/// the same executor can run any number of jobs concurrently.
pub struct JobExecutor {
    provisioner: Arc<dyn Provisioner>,
    fetcher: Arc<dyn SourceFetcher>,
    runner: Arc<dyn ProcessRunner>,
    step_timeout: Option<Duration>,
}

impl JobExecutor {
    pub fn new(
        provisioner: Arc<dyn Provisioner>,
        fetcher: Arc<dyn SourceFetcher>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            provisioner,
            fetcher,
            runner,
            step_timeout: None,
        }
    }

    /// Host-imposed limit for each command step. The pipeline defines none.
    pub fn with_step_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Run one job to completion and produce exactly one result.
    ///
    /// Never returns an error: provisioning, checkout and command problems
    /// all become a failed `JobResult`. The environment is released before
    /// this returns, whatever the outcome.
    pub async fn run_job(&self, job: &Job, source: &SourceRef) -> JobResult {
        let started_at = Utc::now();
        obs::emit_job_started(&job.name, &job.environment.runs_on);

        let env = match self.provisioner.provision(job).await {
            Ok(env) => env,
            Err(e) => {
                let result = JobResult::from_steps(
                    &job.name,
                    Vec::new(),
                    Some(JobFailure::Provisioning {
                        message: e.to_string(),
                    }),
                    started_at,
                );
                obs::emit_job_finished(&result);
                return result;
            }
        };

        let mut records = Vec::with_capacity(job.steps.len());
        let mut failure = None;

        for (index, step) in job.steps.iter().enumerate() {
            let (record, step_failure) = self.run_step(job, index, step, &env, source).await;
            obs::emit_step_finished(&job.name, &record);
            records.push(record);
            if step_failure.is_some() {
                failure = step_failure;
                break;
            }
        }

        drop(env);

        let result = JobResult::from_steps(&job.name, records, failure, started_at);
        obs::emit_job_finished(&result);
        result
    }

    async fn run_step(
        &self,
        job: &Job,
        index: usize,
        step: &Step,
        env: &ProvisionedEnv,
        source: &SourceRef,
    ) -> (StepRecord, Option<JobFailure>) {
        let start = Instant::now();

        match step {
            Step::Checkout => {
                let outcome = self
                    .fetcher
                    .checkout(source, env.workdir(), job.checkout)
                    .await;
                let failure = outcome.err().map(|e| JobFailure::Checkout {
                    message: e.to_string(),
                });
                let record = StepRecord {
                    index,
                    label: step.label(),
                    passed: failure.is_none(),
                    exit_code: None,
                    stdout: String::new(),
                    stderr: failure.as_ref().map(|f| f.to_string()).unwrap_or_default(),
                    duration_ms: start.elapsed().as_millis() as u64,
                };
                (record, failure)
            }
            Step::Command { run } => {
                let spec = CommandSpec::shell(run.as_str())
                    .current_dir(env.workdir())
                    .envs(env.env())
                    .timeout(self.step_timeout);

                match self.runner.run(&spec).await {
                    Ok(output) => {
                        let failure = (!output.success()).then_some(JobFailure::CommandExit {
                            exit_code: output.exit_code,
                        });
                        let record = StepRecord {
                            index,
                            label: step.label(),
                            passed: output.success(),
                            exit_code: Some(output.exit_code),
                            stdout: output.stdout,
                            stderr: output.stderr,
                            duration_ms: start.elapsed().as_millis() as u64,
                        };
                        (record, failure)
                    }
                    Err(e) => {
                        let record = StepRecord {
                            index,
                            label: step.label(),
                            passed: false,
                            exit_code: None,
                            stdout: String::new(),
                            stderr: e.to_string(),
                            duration_ms: start.elapsed().as_millis() as u64,
                        };
                        (
                            record,
                            Some(JobFailure::CommandError {
                                message: e.to_string(),
                            }),
                        )
                    }
                }
            }
        }
    }
}
