//! gatekeep - push / pull-request CI gate
//!
//! The `gatekeep` command evaluates a triggering event against the pipeline's
//! rules and, when it matches, runs every job in parallel and gates on the
//! result.
//!
//! ## Commands
//!
//! - `run`: Run the pipeline for an event and report the verdict
//! - `check-trigger`: Report whether an event would start a run
//! - `show`: Print the effective pipeline definition
//! - `validate`: Check a pipeline definition file

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gatekeep_ci::{
    GitCheckout, JobExecutor, PipelineReport, RunCoordinator, SourceRef, TempDirProvisioner,
    TokioProcessRunner,
};
use gatekeep_core::{Event, EventKind, PipelineDefinition};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "gatekeep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Push / pull-request CI gate", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Event selection shared by `run` and `check-trigger`.
#[derive(clap::Args, Debug, Clone)]
struct EventArgs {
    /// Event kind
    #[arg(long, value_enum, required_unless_present = "from_env")]
    event: Option<EventArg>,

    /// Target branch of the event
    #[arg(long, required_unless_present = "from_env")]
    branch: Option<String>,

    /// Commit to check out (default: the repository's HEAD)
    #[arg(long)]
    revision: Option<String>,

    /// Read the event from GITHUB_EVENT_NAME / GITHUB_REF / GITHUB_BASE_REF / GITHUB_SHA
    #[arg(long, conflicts_with_all = ["event", "branch"])]
    from_env: bool,

    /// Pipeline definition file (default: built-in fmt/clippy/test pipeline)
    #[arg(long, env = "GATEKEEP_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline for an event
    Run {
        #[command(flatten)]
        event: EventArgs,

        /// Repository to check out (path or clone URL)
        #[arg(long, env = "GATEKEEP_REPO", default_value = ".")]
        repo: String,

        /// Kill any single step after this many seconds
        #[arg(long)]
        step_timeout: Option<u64>,

        /// Report format written to stdout
        #[arg(long, value_enum, default_value = "markdown")]
        format: ReportFormat,

        /// Append the Markdown report to this file
        #[arg(long, env = "GITHUB_STEP_SUMMARY")]
        summary_file: Option<PathBuf>,
    },

    /// Report whether an event would start a run
    CheckTrigger {
        #[command(flatten)]
        event: EventArgs,
    },

    /// Print the effective pipeline definition
    Show {
        /// Pipeline definition file (default: built-in pipeline)
        #[arg(long, env = "GATEKEEP_CONFIG")]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "toml")]
        format: DefinitionFormat,
    },

    /// Check a pipeline definition file
    Validate {
        /// Path to the definition (TOML)
        path: PathBuf,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum EventArg {
    Push,
    PullRequest,
}

impl From<EventArg> for EventKind {
    fn from(arg: EventArg) -> Self {
        match arg {
            EventArg::Push => EventKind::Push,
            EventArg::PullRequest => EventKind::PullRequest,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ReportFormat {
    Markdown,
    Json,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum DefinitionFormat {
    Toml,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    gatekeep_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            event,
            repo,
            step_timeout,
            format,
            summary_file,
        } => {
            cmd_run(
                &event,
                &repo,
                step_timeout.map(Duration::from_secs),
                format,
                summary_file.as_deref(),
            )
            .await
        }
        Commands::CheckTrigger { event } => cmd_check_trigger(&event),
        Commands::Show { config, format } => cmd_show(config.as_deref(), format),
        Commands::Validate { path } => cmd_validate(&path),
    }
}

/// Run the pipeline and fail the process when the gate fails
async fn cmd_run(
    args: &EventArgs,
    repo: &str,
    step_timeout: Option<Duration>,
    format: ReportFormat,
    summary_file: Option<&Path>,
) -> Result<()> {
    let definition = load_definition(args.config.as_deref())?;
    let event = resolve_event(args, |k| std::env::var(k).ok())?;
    let source = SourceRef::for_event(resolve_repository(repo)?, &event);

    let runner = Arc::new(TokioProcessRunner::new());
    let executor = JobExecutor::new(
        Arc::new(TempDirProvisioner::new()),
        Arc::new(GitCheckout::new(runner.clone()).with_timeout(step_timeout)),
        runner,
    )
    .with_step_timeout(step_timeout);
    let coordinator = RunCoordinator::new(Arc::new(definition), Arc::new(executor));

    let Some(result) = coordinator
        .run_pipeline(&event, &source)
        .await
        .context("Pipeline run failed")?
    else {
        println!(
            "Event '{}' does not match any trigger of '{}'; nothing to run",
            event,
            coordinator.definition().name()
        );
        return Ok(());
    };

    let report = PipelineReport::new(coordinator.definition().name(), &event, &result);
    match format {
        ReportFormat::Markdown => println!("{}", report.render_markdown()),
        ReportFormat::Json => println!("{}", report.render_json()?),
    }

    if let Some(path) = summary_file {
        report
            .append_markdown_to(path)
            .with_context(|| format!("Failed to write summary to {:?}", path))?;
        info!(path = %path.display(), "summary written");
    }

    if !report.verdict.passed {
        bail!("CI checks failed: {}", report.verdict.message);
    }
    Ok(())
}

/// Report whether the event matches any trigger rule
fn cmd_check_trigger(args: &EventArgs) -> Result<()> {
    let definition = load_definition(args.config.as_deref())?;
    let event = resolve_event(args, |k| std::env::var(k).ok())?;

    match definition.triggers().iter().find(|rule| rule.matches(&event)) {
        Some(rule) => println!(
            "{}: triggered by rule {} on '{}'",
            event, rule.event_kind, rule.branch_pattern
        ),
        None => println!("{}: not triggered", event),
    }
    Ok(())
}

fn cmd_show(config: Option<&Path>, format: DefinitionFormat) -> Result<()> {
    let definition = load_definition(config)?;
    match format {
        DefinitionFormat::Toml => print!("{}", definition.to_toml_string()?),
        DefinitionFormat::Json => println!("{}", serde_json::to_string_pretty(&definition)?),
    }
    Ok(())
}

fn cmd_validate(path: &Path) -> Result<()> {
    let definition = PipelineDefinition::load(path)
        .with_context(|| format!("Invalid pipeline definition {:?}", path))?;

    println!(
        "{}: {} trigger(s), {} job(s) [{}]",
        definition.name(),
        definition.triggers().len(),
        definition.jobs().len(),
        definition.job_names().join(", ")
    );
    println!("Digest: {}", definition.digest()?);
    Ok(())
}

fn load_definition(config: Option<&Path>) -> Result<PipelineDefinition> {
    match config {
        Some(path) => PipelineDefinition::load(path)
            .with_context(|| format!("Failed to load pipeline definition {:?}", path)),
        None => Ok(PipelineDefinition::builtin()),
    }
}

/// Build the event from flags or, with `--from-env`, from the host variables.
fn resolve_event<F>(args: &EventArgs, lookup: F) -> Result<Event>
where
    F: Fn(&str) -> Option<String>,
{
    let event = if args.from_env {
        Event::from_github_env(lookup).context("Failed to read event from environment")?
    } else {
        match (args.event, &args.branch) {
            (Some(kind), Some(branch)) => Event::new(kind.into(), branch.as_str()),
            _ => bail!("--event and --branch are required unless --from-env is given"),
        }
    };

    Ok(match &args.revision {
        Some(rev) => event.at_revision(rev.as_str()),
        None => event,
    })
}

/// Local repositories are cloned from inside each job's workdir, so make
/// their paths absolute. Anything that is not an existing path is a URL.
fn resolve_repository(repo: &str) -> Result<String> {
    let path = Path::new(repo);
    if !path.exists() {
        return Ok(repo.to_string());
    }
    let absolute = std::fs::canonicalize(path)
        .with_context(|| format!("Failed to resolve repository path {:?}", path))?;
    Ok(absolute.to_string_lossy().into_owned())
}
