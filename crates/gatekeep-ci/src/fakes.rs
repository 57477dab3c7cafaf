//! In-memory fakes for the execution traits (testing only)
//!
//! Provides `ScriptedProcessRunner` and `StaticCheckout`, which satisfy the
//! `ProcessRunner` / `SourceFetcher` contracts without running real tools.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use gatekeep_core::CheckoutOptions;

use crate::checkout::{SourceFetcher, SourceRef};
use crate::error::{ExecError, Result};
use crate::process::{CommandSpec, ProcessOutput, ProcessRunner};

// ---------------------------------------------------------------------------
// ScriptedProcessRunner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Script {
    Exit(i32),
    SpawnError,
    Panic,
}

/// Process runner that answers from a script instead of spawning anything.
///
/// Commands whose display string contains a scripted pattern get the scripted
/// behavior (first match wins); everything else exits 0. Every call is
/// recorded, along with the highest number of calls in flight at once.
#[derive(Debug, Default)]
pub struct ScriptedProcessRunner {
    scripts: Vec<(String, Script)>,
    delay: Option<Duration>,
    calls: Mutex<Vec<CommandSpec>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `pattern` exit with `exit_code`.
    pub fn fail_on(mut self, pattern: &str, exit_code: i32) -> Self {
        self.scripts
            .push((pattern.to_string(), Script::Exit(exit_code)));
        self
    }

    /// Commands containing `pattern` cannot be spawned.
    pub fn spawn_error_on(mut self, pattern: &str) -> Self {
        self.scripts.push((pattern.to_string(), Script::SpawnError));
        self
    }

    /// Commands containing `pattern` panic the calling task.
    pub fn panic_on(mut self, pattern: &str) -> Self {
        self.scripts.push((pattern.to_string(), Script::Panic));
        self
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Display strings of every command run so far, in call order.
    pub fn commands(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::display).collect()
    }

    /// Every command run so far, in call order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Highest number of commands observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn script_for(&self, line: &str) -> Option<&Script> {
        self.scripts
            .iter()
            .find(|(pattern, _)| line.contains(pattern.as_str()))
            .map(|(_, script)| script)
    }
}

#[async_trait]
impl ProcessRunner for ScriptedProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(spec.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let line = spec.display();
        let exit_code = match self.script_for(&line) {
            None => 0,
            Some(Script::Exit(code)) => *code,
            Some(Script::SpawnError) => {
                return Err(ExecError::Spawn {
                    program: spec.program.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted"),
                })
            }
            Some(Script::Panic) => panic!("scripted panic for `{line}`"),
        };

        Ok(ProcessOutput {
            exit_code,
            stdout: format!("ran: {line}\n"),
            stderr: if exit_code == 0 {
                String::new()
            } else {
                format!("scripted failure ({exit_code})\n")
            },
            duration_ms: self.delay.map(|d| d.as_millis() as u64).unwrap_or(0),
        })
    }
}

// ---------------------------------------------------------------------------
// StaticCheckout
// ---------------------------------------------------------------------------

/// One recorded checkout request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutCall {
    pub source: SourceRef,
    pub dest: PathBuf,
    pub recursive: bool,
}

/// Source fetcher that writes a marker file instead of cloning.
///
/// Recursive checkouts also write `vendor/nested/.git-submodule` so tests can
/// observe that nested sub-repositories were populated.
#[derive(Debug, Default)]
pub struct StaticCheckout {
    failure: Option<String>,
    calls: Mutex<Vec<CheckoutCall>>,
}

impl StaticCheckout {
    /// Marker file written at the checkout root.
    pub const MARKER: &'static str = "CHECKED_OUT";

    /// Path of the nested marker written by recursive checkouts.
    pub const NESTED_MARKER: &'static str = "vendor/nested/.git-submodule";

    pub fn new() -> Self {
        Self::default()
    }

    /// Every checkout fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<CheckoutCall> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl SourceFetcher for StaticCheckout {
    async fn checkout(&self, source: &SourceRef, dest: &Path, options: CheckoutOptions) -> Result<()> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(CheckoutCall {
                source: source.clone(),
                dest: dest.to_path_buf(),
                recursive: options.recursive,
            });

        if let Some(message) = &self.failure {
            return Err(ExecError::Checkout(message.clone()));
        }

        tokio::fs::write(dest.join(Self::MARKER), source.repository.as_bytes()).await?;
        if options.recursive {
            let nested = dest.join(Self::NESTED_MARKER);
            if let Some(parent) = nested.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(nested, b"nested").await?;
        }
        Ok(())
    }
}
