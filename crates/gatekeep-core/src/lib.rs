//! gatekeep core domain model
//!
//! Defines the static and runtime objects of a push / pull-request gate:
//! - Event: the host's trigger notification (push or pull request + branch)
//! - TriggerRule: static event-kind + branch-pattern filter
//! - Job / Step: independently executed verification units
//! - JobResult / PipelineResult: per-job outcome and the gating aggregate
//! - PipelineDefinition: immutable trigger rules + job set, built once
//!
//! Execution lives in `gatekeep-ci`; this crate has no I/O besides loading
//! definitions from disk.

pub mod definition;
pub mod error;
pub mod event;
pub mod job;
pub mod obs;
pub mod result;
pub mod telemetry;
pub mod trigger;

pub use definition::{PipelineDefinition, DEFAULT_BRANCH};
pub use error::{GatekeepError, Result};
pub use event::{Event, EventKind};
pub use job::{CheckoutOptions, EnvironmentSpec, Job, Step};
pub use result::{JobFailure, JobResult, Outcome, PipelineResult, StepRecord};
pub use telemetry::init_tracing;
pub use trigger::{evaluate, BranchPattern, TriggerRule};

/// gatekeep version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
