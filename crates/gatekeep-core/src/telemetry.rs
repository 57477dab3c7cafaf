//! Log subscriber setup for the `gatekeep` binary.
//!
//! Logs go to stderr; stdout is reserved for reports. Without `RUST_LOG`
//! only gatekeep's own crates log at the requested level and dependencies
//! stay at `warn`. JSON lines carry the enclosing run span, so every event
//! of a run has its `run_id`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events pass the default filter at the requested level.
const GATEKEEP_TARGETS: &[&str] = &["gatekeep", "gatekeep_core", "gatekeep_ci", "gatekeep_cli"];

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    std::iter::once("warn".to_string())
        .chain(GATEKEEP_TARGETS.iter().map(|t| format!("{t}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber. Only the first call in a process wins.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
    // Err only means a subscriber is already set (tests, embedding hosts).
    installed.ok();
}
