//! CLI binary for running and validating tabula list pipelines.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};
use serde_json::Value;

use tabula_pipeline::{
    default_registry, pagination, DynStep, MemoryBase, MemoryQuery, PipelineDefinition, Severity,
    StepRegistry,
};
use tabula_types::{Pagination, Params};

#[derive(Parser)]
#[command(name = "tabula", version, about = "Step pipelines for paginated record lists")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline definition over a JSON record file
    Run {
        /// Path to the pipeline definition (.json)
        pipeline: PathBuf,

        /// JSON array of records served by the `base` step
        #[arg(short, long)]
        records: PathBuf,

        /// Step to run through (default: the last declared step)
        #[arg(short, long)]
        step: Option<String>,

        /// Request parameter as key=value; repeatable
        #[arg(short, long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },

    /// Lint a pipeline definition
    Validate {
        /// Path to the pipeline definition (.json)
        pipeline: PathBuf,
    },

    /// Print the pagination descriptor for a page request
    Page {
        /// Requested page (default 1)
        #[arg(long)]
        page: Option<String>,

        /// Page size
        #[arg(long)]
        per_page: String,

        /// Total number of records
        #[arg(long)]
        count: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            pipeline,
            records,
            step,
            params,
        } => {
            let state = cmd_run(&pipeline, &records, step.as_deref(), &params)?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Commands::Validate { pipeline } => {
            cmd_validate(&pipeline)?;
        }
        Commands::Page {
            page,
            per_page,
            count,
        } => {
            println!("{}", serde_json::to_string_pretty(&cmd_page(page, per_page, count)?)?);
        }
    }

    Ok(())
}

/// Registry with the built-in steps plus a `base` step over `records`.
fn registry(records: Vec<Value>) -> StepRegistry<MemoryQuery> {
    let mut registry = default_registry();
    registry.register_as("base", DynStep::new(MemoryBase::new(records)));
    registry
}

fn load_records(path: &Path) -> anyhow::Result<Vec<Value>> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("reading records from {}", path.display()))?;
    match serde_json::from_str(&source)? {
        Value::Array(records) => Ok(records),
        other => bail!(
            "{} must contain a JSON array of records, found {}",
            path.display(),
            json_type(&other)
        ),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parse `key=value` pairs. Values that read as JSON (numbers, booleans,
/// objects) keep that type; anything else is a string.
fn parse_params(pairs: &[String]) -> anyhow::Result<Params> {
    pairs.iter().try_fold(Params::new(), |params, pair| {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("parameter '{pair}' is not in key=value form");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("parameter '{pair}' has an empty key");
        }
        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        Ok(params.with(key, value))
    })
}

fn cmd_run(
    definition: &Path,
    records: &Path,
    step: Option<&str>,
    params: &[String],
) -> anyhow::Result<tabula_types::ListState<MemoryQuery>> {
    let definition = PipelineDefinition::load(definition)
        .with_context(|| format!("loading pipeline {}", definition.display()))?;
    let pipeline = definition.build(registry(load_records(records)?))?;

    let target = match step {
        Some(name) => name.to_string(),
        None => match pipeline.step_names().last() {
            Some(name) => name.to_string(),
            None => bail!("pipeline '{}' declares no steps", pipeline.name()),
        },
    };

    let params = parse_params(params)?;
    tracing::info!(pipeline = %pipeline.name(), step = %target, "Running pipeline");
    Ok(pipeline.run_from_params(&target, params)?)
}

fn cmd_page(page: Option<String>, per_page: String, count: u64) -> anyhow::Result<Pagination> {
    pagination::build(page, per_page.as_str(), count)
        .with_context(|| format!("computing pagination for {count} records"))
}

fn cmd_validate(path: &Path) -> anyhow::Result<()> {
    let definition = PipelineDefinition::load(path)?;
    let diagnostics = definition.validate(&registry(Vec::new()))?;

    if diagnostics.is_empty() {
        println!("Pipeline '{}' is valid", definition.name);
        return Ok(());
    }

    let mut has_error = false;
    for diag in &diagnostics {
        let severity = match diag.severity {
            Severity::Error => {
                has_error = true;
                "ERROR"
            }
            Severity::Warning => "WARN",
        };
        match &diag.step {
            Some(step) => println!("[{severity}] {} ({step}): {}", diag.rule, diag.message),
            None => println!("[{severity}] {}: {}", diag.rule, diag.message),
        }
        if let Some(fix) = &diag.fix {
            println!("    fix: {fix}");
        }
    }

    if has_error {
        std::process::exit(1);
    }
    Ok(())
}
