//! Per-job environment provisioning.

use crate::error::{ExecError, Result};
use async_trait::async_trait;
use gatekeep_core::Job;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// A fresh, isolated environment owned by exactly one job.
///
/// Dropping it tears the environment down, so release happens on every
/// exit path of the job, passing or failing.
pub struct ProvisionedEnv {
    job_name: String,
    workdir: PathBuf,
    env: BTreeMap<String, String>,
    _guard: Option<TempDir>,
}

impl ProvisionedEnv {
    /// An environment rooted at a temporary directory that is removed on drop.
    pub fn from_tempdir(job_name: &str, dir: TempDir, env: BTreeMap<String, String>) -> Self {
        Self {
            job_name: job_name.to_string(),
            workdir: dir.path().to_path_buf(),
            env,
            _guard: Some(dir),
        }
    }

    /// An environment rooted at an existing directory the caller manages.
    pub fn unmanaged(job_name: &str, workdir: PathBuf, env: BTreeMap<String, String>) -> Self {
        Self {
            job_name: job_name.to_string(),
            workdir,
            env,
            _guard: None,
        }
    }

    /// Directory the checkout lands in and commands run from.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Variables exported to every command of the job.
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }
}

impl Drop for ProvisionedEnv {
    fn drop(&mut self) {
        debug!(job = %self.job_name, workdir = %self.workdir.display(), "tearing down environment");
    }
}

/// Supplies one environment per job on request.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn provision(&self, job: &Job) -> Result<ProvisionedEnv>;
}

/// Provisions each job into its own temporary directory.
///
/// The job's `runs_on` label is recorded in `GATEKEEP_RUNS_ON`; machine
/// images themselves are the host's business.
#[derive(Debug, Default, Clone)]
pub struct TempDirProvisioner {
    base: Option<PathBuf>,
}

impl TempDirProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create job directories under `base` instead of the system temp dir.
    pub fn in_dir(base: impl Into<PathBuf>) -> Self {
        Self {
            base: Some(base.into()),
        }
    }
}

#[async_trait]
impl Provisioner for TempDirProvisioner {
    async fn provision(&self, job: &Job) -> Result<ProvisionedEnv> {
        let prefix = format!("gatekeep-{}-", job.name);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match &self.base {
            Some(base) => builder.tempdir_in(base),
            None => builder.tempdir(),
        }
        .map_err(|e| ExecError::Provisioning(format!("job '{}': {}", job.name, e)))?;

        let mut env = job.environment.env.clone();
        env.insert("GATEKEEP_JOB".to_string(), job.name.clone());
        env.insert(
            "GATEKEEP_RUNS_ON".to_string(),
            job.environment.runs_on.clone(),
        );

        debug!(job = %job.name, workdir = %dir.path().display(), "provisioned environment");
        Ok(ProvisionedEnv::from_tempdir(&job.name, dir, env))
    }
}
