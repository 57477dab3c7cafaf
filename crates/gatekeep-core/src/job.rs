//! Job and step definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Default machine image label requested from the host.
pub const DEFAULT_RUNS_ON: &str = "ubuntu-latest";

/// Execution environment descriptor.
///
/// Opaque to the pipeline itself; handed to the provisioner, which decides
/// what a `runs_on` label means.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvironmentSpec {
    /// Machine image label (e.g. "ubuntu-latest").
    #[serde(default = "default_runs_on")]
    pub runs_on: String,

    /// Environment variables exported to every command step.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

fn default_runs_on() -> String {
    DEFAULT_RUNS_ON.to_string()
}

impl Default for EnvironmentSpec {
    fn default() -> Self {
        Self {
            runs_on: default_runs_on(),
            env: BTreeMap::new(),
        }
    }
}

impl EnvironmentSpec {
    pub fn new(runs_on: impl Into<String>) -> Self {
        Self {
            runs_on: runs_on.into(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Options for the checkout step of a job.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutOptions {
    /// Also fetch nested submodules, recursively.
    #[serde(default)]
    pub recursive: bool,
}

/// A single action within a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// Fetch the repository snapshot of the triggering event.
    Checkout,

    /// Run a shell command inside the provisioned environment.
    Command { run: String },
}

impl Step {
    pub fn command(run: impl Into<String>) -> Self {
        Step::Command { run: run.into() }
    }

    /// Short label used in logs and reports.
    pub fn label(&self) -> String {
        match self {
            Step::Checkout => "checkout".to_string(),
            Step::Command { run } => run.clone(),
        }
    }

    pub fn command_text(&self) -> Option<&str> {
        match self {
            Step::Checkout => None,
            Step::Command { run } => Some(run),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Checkout => f.write_str("checkout"),
            Step::Command { run } => write!(f, "run: {run}"),
        }
    }
}

/// One independently executed verification unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Job {
    /// Unique within the job set.
    pub name: String,

    #[serde(default)]
    pub environment: EnvironmentSpec,

    #[serde(default)]
    pub checkout: CheckoutOptions,

    /// Executed strictly in order; the first failing step ends the job.
    pub steps: Vec<Step>,
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            environment: EnvironmentSpec::default(),
            checkout: CheckoutOptions::default(),
            steps: Vec::new(),
        }
    }

    pub fn runs_on(mut self, environment: EnvironmentSpec) -> Self {
        self.environment = environment;
        self
    }

    pub fn checkout(mut self, options: CheckoutOptions) -> Self {
        self.checkout = options;
        self.steps.push(Step::Checkout);
        self
    }

    pub fn run(mut self, command: impl Into<String>) -> Self {
        self.steps.push(Step::command(command));
        self
    }

    pub fn has_checkout(&self) -> bool {
        self.steps.iter().any(|s| matches!(s, Step::Checkout))
    }
}
