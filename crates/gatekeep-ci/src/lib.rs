//! gatekeep CI - pipeline execution
//!
//! Provides the run coordinator that:
//! - Filters events through the definition's trigger rules
//! - Provisions an isolated environment per job and runs its steps in order
//! - Runs all jobs concurrently and gates on the AND of their outcomes
//! - Renders the result for the host (Markdown summary, JSON)
//!
//! External tools (git, cargo) are reached only through the `ProcessRunner`,
//! `SourceFetcher` and `Provisioner` traits; `fakes` has in-memory doubles.

pub mod checkout;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod fakes;
pub mod gate;
pub mod process;
pub mod provision;
pub mod report;

// Re-export key types
pub use checkout::{GitCheckout, SourceFetcher, SourceRef};
pub use coordinator::RunCoordinator;
pub use error::{ExecError, Result};
pub use executor::JobExecutor;
pub use gate::{CiGate, GateVerdict};
pub use process::{CommandSpec, ProcessOutput, ProcessRunner, TokioProcessRunner};
pub use provision::{ProvisionedEnv, Provisioner, TempDirProvisioner};
pub use report::PipelineReport;
