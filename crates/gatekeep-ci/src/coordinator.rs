//! Run coordination: trigger check, parallel fan-out, barrier, gating.

use crate::checkout::SourceRef;
use crate::error::Result;
use crate::executor::JobExecutor;
use chrono::Utc;
use futures::future::join_all;
use gatekeep_core::obs;
use gatekeep_core::{Event, JobResult, PipelineDefinition, PipelineResult};
use std::sync::Arc;
use tracing::{error, info, Instrument};
use uuid::Uuid;

/// Pipeline orchestrator.
///
/// Holds the immutable definition and the executor; both are shared with
/// the per-job tasks through `Arc`, and nothing mutable is shared between
/// jobs.
pub struct RunCoordinator {
    definition: Arc<PipelineDefinition>,
    executor: Arc<JobExecutor>,
}

impl RunCoordinator {
    pub fn new(definition: Arc<PipelineDefinition>, executor: Arc<JobExecutor>) -> Self {
        Self {
            definition,
            executor,
        }
    }

    pub fn definition(&self) -> &PipelineDefinition {
        &self.definition
    }

    /// Run the pipeline for `event`.
    ///
    /// Returns `Ok(None)` when no trigger rule matches: nothing is
    /// dispatched and nothing is reported. Otherwise every job is spawned
    /// as its own task, all of them are awaited (a failing job does not
    /// cancel its siblings) and the gated result is returned with jobs in
    /// definition order.
    pub async fn run_pipeline(&self, event: &Event, source: &SourceRef) -> Result<Option<PipelineResult>> {
        if !self.definition.should_trigger(event) {
            obs::emit_pipeline_skipped(self.definition.name(), event);
            return Ok(None);
        }

        let run_id = Uuid::new_v4().to_string();
        let span = obs::run_span(&run_id);
        let result = self
            .dispatch(run_id, event, source)
            .instrument(span)
            .await?;
        Ok(Some(result))
    }

    async fn dispatch(&self, run_id: String, event: &Event, source: &SourceRef) -> Result<PipelineResult> {
        let started_at = Utc::now();
        let digest = self.definition.digest()?;

        obs::emit_pipeline_started(
            &run_id,
            self.definition.name(),
            event,
            self.definition.jobs().len(),
        );

        let handles: Vec<_> = self
            .definition
            .jobs()
            .iter()
            .map(|job| {
                let executor = Arc::clone(&self.executor);
                let job = job.clone();
                let source = source.clone();
                let name = job.name.clone();
                let handle = tokio::spawn(
                    async move { executor.run_job(&job, &source).await }
                        .instrument(tracing::Span::current()),
                );
                (name, handle)
            })
            .collect();

        let (names, handles): (Vec<String>, Vec<_>) = handles.into_iter().unzip();
        let joined = join_all(handles).await;

        let results: Vec<JobResult> = names
            .into_iter()
            .zip(joined)
            .map(|(name, joined)| match joined {
                Ok(result) => result,
                Err(e) => {
                    error!(job = %name, error = %e, "job task died before reporting");
                    let result = JobResult::aborted(name, e.to_string());
                    obs::emit_job_finished(&result);
                    result
                }
            })
            .collect();

        let result = PipelineResult::aggregate(
            run_id,
            digest,
            &self.definition.job_names(),
            results,
            started_at,
        )?;

        obs::emit_pipeline_finished(&result);
        for job in result.failed_jobs() {
            info!(
                job = %job.job_name,
                step = ?job.first_failing_step,
                step_label = job.failing_step_label().unwrap_or("-"),
                "job failed"
            );
        }

        Ok(result)
    }
}
