//! Source checkout: fetching the repository snapshot of the triggering event.

use crate::error::{ExecError, Result};
use crate::process::{CommandSpec, ProcessRunner};
use async_trait::async_trait;
use gatekeep_core::{CheckoutOptions, Event};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Where the snapshot comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    /// Clone URL or local path of the repository.
    pub repository: String,

    /// Commit to check out. `None` keeps the cloned default HEAD.
    pub revision: Option<String>,
}

impl SourceRef {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            revision: None,
        }
    }

    /// Snapshot of `repository` at the revision carried by `event`.
    pub fn for_event(repository: impl Into<String>, event: &Event) -> Self {
        Self {
            repository: repository.into(),
            revision: event.revision.clone(),
        }
    }
}

/// Fetches a snapshot into a job's working directory.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn checkout(&self, source: &SourceRef, dest: &Path, options: CheckoutOptions) -> Result<()>;
}

/// Checkout through the `git` command line.
///
/// Clones into the (empty) destination, detaches at the requested revision
/// and, for recursive checkouts, initialises submodules all the way down.
/// A revision the clone did not bring along (pull-request merge commits live
/// under `refs/pull/*`, which a clone skips) is fetched by id first.
pub struct GitCheckout {
    runner: Arc<dyn ProcessRunner>,
    timeout: Option<Duration>,
}

impl GitCheckout {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, dest: &Path, args: &[&str]) -> CommandSpec {
        CommandSpec::new("git")
            .args(args.iter().copied())
            .current_dir(dest)
            .timeout(self.timeout)
    }

    /// Whether `rev` names a commit already present in the clone.
    async fn has_commit(&self, dest: &Path, rev: &str) -> Result<bool> {
        let object = format!("{rev}^{{commit}}");
        let spec = self.command(dest, &["cat-file", "-e", object.as_str()]);
        let output = self
            .runner
            .run(&spec)
            .await
            .map_err(|e| ExecError::Checkout(e.to_string()))?;
        Ok(output.success())
    }

    async fn git(&self, dest: &Path, args: &[&str]) -> Result<()> {
        let spec = self.command(dest, args);
        debug!(command = %spec.display(), "checkout");

        let output = self
            .runner
            .run(&spec)
            .await
            .map_err(|e| ExecError::Checkout(e.to_string()))?;
        if !output.success() {
            return Err(ExecError::Checkout(format!(
                "`{}` exited with code {}: {}",
                spec.display(),
                output.exit_code,
                output.stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SourceFetcher for GitCheckout {
    async fn checkout(&self, source: &SourceRef, dest: &Path, options: CheckoutOptions) -> Result<()> {
        self.git(dest, &["clone", "--quiet", source.repository.as_str(), "."])
            .await?;

        if let Some(rev) = &source.revision {
            if !self.has_commit(dest, rev).await? {
                self.git(dest, &["fetch", "--quiet", "origin", rev.as_str()])
                    .await?;
            }
            self.git(dest, &["checkout", "--quiet", "--detach", rev.as_str()])
                .await?;
        }

        if options.recursive {
            // Local-path submodules need the file transport explicitly allowed.
            self.git(
                dest,
                &[
                    "-c",
                    "protocol.file.allow=always",
                    "submodule",
                    "update",
                    "--init",
                    "--recursive",
                ],
            )
            .await?;
        }

        Ok(())
    }
}
