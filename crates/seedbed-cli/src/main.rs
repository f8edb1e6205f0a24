mod registry;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use registry::{RunContext, init_logging, start_run, write_reports};
use seedbed_core::{SchemaCatalog, SchemaProvider, SharedSchema};
use seedbed_generate::{DirectoryStore, GenerationError, build_dataset};
use seedbed_plan::{
    IssueSeverity, PlanError, ValidatedPlan, ValidationIssue, ValidationReport, load_plan_value,
    plan_json_schema, plan_json_schema_value, validate_plan,
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("core error: {0}")]
    Core(#[from] seedbed_core::Error),
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("plan failed validation with {0} error(s)")]
    InvalidPlan(usize),
}

#[derive(Parser, Debug)]
#[command(name = "seedbed", version, about = "Synthetic record generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a dataset from a plan into a new run directory.
    Generate(GenerateArgs),
    /// Validate a plan without generating anything.
    Validate(ValidateArgs),
    /// List the record kinds of a schema catalog.
    Kinds(KindsArgs),
    /// Print the JSON Schema for dataset plans.
    PlanSchema,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Plan file (.json or .toml).
    #[arg(long)]
    plan: PathBuf,
    /// Schema catalog JSON; defaults to the built-in clinical catalog.
    #[arg(long)]
    schema: Option<PathBuf>,
    /// Output directory for runs.
    #[arg(long, default_value = "out")]
    out: PathBuf,
    /// Seed overriding the one in the plan.
    #[arg(long)]
    seed: Option<u64>,
    /// Emit logs as JSON lines.
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Plan file (.json or .toml).
    #[arg(long)]
    plan: PathBuf,
    /// Schema catalog JSON; defaults to the built-in clinical catalog.
    #[arg(long)]
    schema: Option<PathBuf>,
    /// Print the validation report as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args, Debug)]
struct KindsArgs {
    /// Schema catalog JSON; defaults to the built-in clinical catalog.
    #[arg(long)]
    schema: Option<PathBuf>,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Validate(args) => run_validate(args),
        Command::Kinds(args) => run_kinds(args),
        Command::PlanSchema => run_plan_schema(),
    }
}

fn run_generate(args: GenerateArgs) -> Result<(), CliError> {
    let GenerateArgs {
        plan,
        schema,
        out,
        seed,
        log_json,
    } = args;

    let catalog = load_catalog(schema.as_deref())?;
    let mut validated = match load_and_validate(&plan, &catalog)? {
        Ok(validated) => validated,
        Err(report) => {
            print_issues(&report.errors);
            return Err(CliError::InvalidPlan(report.errors.len()));
        }
    };
    if seed.is_some() {
        validated.plan.seed = seed;
    }

    let run_ctx = RunContext {
        run_id: Uuid::new_v4().to_string(),
        started_at: chrono::Utc::now(),
        out_dir: out,
        plan_path: plan.clone(),
        catalog_path: schema,
        seed: validated.plan.seed,
    };
    let run_paths = start_run(&run_ctx)?;
    init_logging(log_json, Some(&run_paths.logs_path))?;

    tracing::info!(event = "run_started", run_id = %run_ctx.run_id, plan = %plan.display());
    for issue in &validated.warnings {
        tracing::warn!(event = "plan_warning", code = %issue.code, path = %issue.path, "{}", issue.message);
    }

    let timer = Instant::now();
    let schema: SharedSchema = Arc::new(catalog);
    let mut generator = build_dataset(&validated.plan, schema)?;
    let dataset = generator.generate()?;
    tracing::info!(event = "dataset_generated", records = dataset.len());

    let mut store = DirectoryStore::new(&run_paths.records_dir);
    let upload = dataset.upload(&mut store)?;
    tracing::info!(
        event = "records_written",
        path = %store.root().display(),
        bytes = store.bytes_written()
    );

    write_reports(&run_paths, dataset.report(), &upload)?;

    let duration_ms = timer.elapsed().as_millis() as u64;
    tracing::info!(event = "run_finished", status = "success", duration_ms = duration_ms);

    println!("{}", run_paths.root.display());
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<(), CliError> {
    init_logging(false, None)?;
    let catalog = load_catalog(args.schema.as_deref())?;

    let report = match load_and_validate(&args.plan, &catalog)? {
        Ok(validated) => {
            tracing::info!(
                event = "plan_valid",
                nodes = validated.plan.nodes.len(),
                warnings = validated.warnings.len()
            );
            ValidationReport {
                errors: Vec::new(),
                warnings: validated.warnings,
            }
        }
        Err(report) => report,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_issues(&report.errors);
        print_issues(&report.warnings);
    }

    if report.is_ok() {
        Ok(())
    } else {
        Err(CliError::InvalidPlan(report.errors.len()))
    }
}

fn run_kinds(args: KindsArgs) -> Result<(), CliError> {
    let catalog = load_catalog(args.schema.as_deref())?;
    for schema in &catalog.kinds {
        let required = catalog.required_fields(&schema.kind)?;
        let required = required.into_iter().collect::<Vec<_>>().join(", ");
        match &schema.description {
            Some(description) => println!("{}\t[{required}]\t{description}", schema.kind),
            None => println!("{}\t[{required}]", schema.kind),
        }
    }
    Ok(())
}

fn run_plan_schema() -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(&plan_json_schema())?);
    Ok(())
}

fn load_catalog(path: Option<&Path>) -> Result<SchemaCatalog, CliError> {
    let catalog = match path {
        Some(path) => SchemaCatalog::from_json(&std::fs::read_to_string(path)?)?,
        None => SchemaCatalog::clinical()?,
    };
    Ok(catalog)
}

/// Load errors are fatal; validation issues come back as a report.
fn load_and_validate(
    plan_path: &Path,
    catalog: &SchemaCatalog,
) -> Result<Result<ValidatedPlan, ValidationReport>, CliError> {
    let plan_json = load_plan_value(plan_path)?;
    let plan_schema = plan_json_schema_value()?;
    Ok(validate_plan(&plan_json, &plan_schema, catalog))
}

fn print_issues(issues: &[ValidationIssue]) {
    for issue in issues {
        let severity = match issue.severity {
            IssueSeverity::Error => "error",
            IssueSeverity::Warning => "warning",
        };
        eprintln!("{severity}[{}] {}: {}", issue.code, issue.path, issue.message);
        if let Some(hint) = &issue.hint {
            eprintln!("  hint: {hint}");
        }
    }
}
