//! Pipeline definition: the static trigger rules plus the job set.
//!
//! A definition is built once at startup (either [`PipelineDefinition::builtin`]
//! or loaded from TOML) and never mutated afterwards. Construction validates
//! it, so every `PipelineDefinition` in circulation has unique job names.

use crate::error::{GatekeepError, Result};
use crate::event::{Event, EventKind};
use crate::job::{CheckoutOptions, EnvironmentSpec, Job, Step, DEFAULT_RUNS_ON};
use crate::trigger::{self, TriggerRule};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Branch the built-in definition gates.
pub const DEFAULT_BRANCH: &str = "main";

pub const FMT_COMMAND: &str = "cargo fmt -- --check";
pub const CLIPPY_COMMAND: &str = "cargo clippy --all-targets --locked -- --deny=warnings";
pub const TEST_COMMAND: &str = "cargo test --locked";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineDefinition {
    name: String,

    #[serde(rename = "trigger")]
    triggers: Vec<TriggerRule>,

    #[serde(rename = "job")]
    jobs: Vec<Job>,
}

impl PipelineDefinition {
    /// Create and validate a definition.
    pub fn new(name: impl Into<String>, triggers: Vec<TriggerRule>, jobs: Vec<Job>) -> Result<Self> {
        let definition = Self {
            name: name.into(),
            triggers,
            jobs,
        };
        definition.validate()?;
        Ok(definition)
    }

    /// The stock Rust gate: push or pull request to `main` runs `fmt`,
    /// `clippy` and `test`, each on its own `ubuntu-latest` machine.
    pub fn builtin() -> Self {
        let env = EnvironmentSpec::new(DEFAULT_RUNS_ON);
        Self {
            name: "ci".to_string(),
            triggers: vec![
                TriggerRule::new(EventKind::Push, DEFAULT_BRANCH),
                TriggerRule::new(EventKind::PullRequest, DEFAULT_BRANCH),
            ],
            jobs: vec![
                Job::new("fmt")
                    .runs_on(env.clone())
                    .checkout(CheckoutOptions::default())
                    .run(FMT_COMMAND),
                Job::new("clippy")
                    .runs_on(env.clone())
                    .checkout(CheckoutOptions::default())
                    .run(CLIPPY_COMMAND),
                Job::new("test")
                    .runs_on(env)
                    .checkout(CheckoutOptions { recursive: true })
                    .run(TEST_COMMAND),
            ],
        }
    }

    /// Parse and validate a TOML definition.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let definition: Self = toml::from_str(s)?;
        definition.validate()?;
        Ok(definition)
    }

    /// Load a TOML definition from disk.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading pipeline definition");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(GatekeepError::InvalidDefinition(
                "pipeline name must not be empty".to_string(),
            ));
        }
        if self.triggers.is_empty() {
            return Err(GatekeepError::InvalidDefinition(
                "at least one trigger rule is required".to_string(),
            ));
        }
        if let Some(rule) = self
            .triggers
            .iter()
            .find(|r| r.branch_pattern.as_str().is_empty())
        {
            return Err(GatekeepError::InvalidDefinition(format!(
                "trigger for {} has an empty branch pattern",
                rule.event_kind
            )));
        }
        if self.jobs.is_empty() {
            return Err(GatekeepError::InvalidDefinition(
                "at least one job is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for job in &self.jobs {
            if job.name.trim().is_empty() {
                return Err(GatekeepError::InvalidDefinition(
                    "job name must not be empty".to_string(),
                ));
            }
            if !seen.insert(job.name.as_str()) {
                return Err(GatekeepError::DuplicateJobName(job.name.clone()));
            }
            if job.steps.is_empty() {
                return Err(GatekeepError::InvalidDefinition(format!(
                    "job '{}' has no steps",
                    job.name
                )));
            }
            for (idx, step) in job.steps.iter().enumerate() {
                if let Step::Command { run } = step {
                    if run.trim().is_empty() {
                        return Err(GatekeepError::InvalidDefinition(format!(
                            "job '{}' step {} has an empty command",
                            job.name, idx
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn triggers(&self) -> &[TriggerRule] {
        &self.triggers
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn job(&self, name: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.name == name)
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|j| j.name.as_str()).collect()
    }

    /// Whether `event` should run this pipeline.
    pub fn should_trigger(&self, event: &Event) -> bool {
        trigger::evaluate(event, &self.triggers)
    }

    /// SHA-256 over the canonical JSON form of the definition.
    pub fn digest(&self) -> Result<String> {
        let canonical = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        Ok(hex::encode(hasher.finalize()))
    }
}
