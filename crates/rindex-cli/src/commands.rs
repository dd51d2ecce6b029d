use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use rindex_repo::{Entity, FieldType, InMemoryKvStore, Repository, RepositoryConfig, Schema};
use rindex_runtime::{Runtime, RuntimeConfig, StepOutcome};
use rindex_types::Fields;
use serde::Serialize;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Scenario => cmd_scenario(cli.format).await,
        Command::Validate(args) => cmd_validate(args, cli.format),
        Command::CheckConfig(args) => cmd_check_config(args, cli.format).await,
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Inline JSON, or the contents of a file when prefixed with `@`.
fn read_json_arg(arg: &str) -> anyhow::Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {path}")),
        None => Ok(arg.to_string()),
    }
}

// ---- scenario ----

#[derive(Debug, Serialize)]
struct ScenarioOutcome {
    open_first: Vec<String>,
    open_same_key: Vec<String>,
    open_fresh_key: Vec<String>,
    done_id: String,
    deleted_id: String,
    count_before_delete: u64,
    count_after_delete: u64,
    remaining: Vec<String>,
    full_scans: u64,
}

fn ids(entities: &[Entity]) -> Vec<String> {
    entities
        .iter()
        .filter_map(|e| e.id().map(ToString::to_string))
        .collect()
}

fn is_open(entity: &Entity) -> bool {
    entity.get_bool("done") == Some(false)
}

async fn run_scenario() -> anyhow::Result<ScenarioOutcome> {
    let schema = Schema::new()
        .required("desc", FieldType::String)
        .required("done", FieldType::Boolean);
    let repo = Repository::new(
        RepositoryConfig::new("todos", schema),
        Arc::new(InMemoryKvStore::new()),
    );
    let todo = |desc: &str, done: bool| Entity::new().with_field("desc", desc).with_field("done", done);

    let x = repo.set(todo("a", false)).await?;
    let x_id = x.id().cloned().context("missing id after set")?;
    let open_first = ids(&repo.find("done=false", is_open).await?);

    let y = repo.set(todo("b", true)).await?;
    let y_id = y.id().cloned().context("missing id after set")?;
    let open_same_key = ids(&repo.find("done=false", is_open).await?);
    let open_fresh_key = ids(&repo.find("done=false#2", is_open).await?);

    let count_before_delete = repo.count().await?;
    repo.delete_by_id(&x_id).await?;
    let remaining = ids(&repo.find_all().await?);
    let count_after_delete = repo.count().await?;

    Ok(ScenarioOutcome {
        open_first,
        open_same_key,
        open_fresh_key,
        done_id: y_id.to_string(),
        deleted_id: x_id.to_string(),
        count_before_delete,
        count_after_delete,
        remaining,
        full_scans: repo.stats().full_scans,
    })
}

fn short(id: &str) -> String {
    id.chars().take(12).collect()
}

fn short_list(ids: &[String]) -> String {
    let shown: Vec<String> = ids.iter().map(|id| short(id)).collect();
    format!("[{}]", shown.join(", "))
}

async fn cmd_scenario(format: OutputFormat) -> anyhow::Result<()> {
    let outcome = run_scenario().await?;
    if format == OutputFormat::Json {
        return print_json(&outcome);
    }

    let x = short(&outcome.deleted_id);
    let y = short(&outcome.done_id);
    println!("{} todos (in-memory store)", "Scenario".bold());
    println!("  set {{desc: a, done: false}}  -> {}", x.yellow());
    println!("  find done=false              -> {}", short_list(&outcome.open_first));
    println!("  set {{desc: b, done: true}}   -> {}", y.yellow());
    println!(
        "  find done=false (cached)     -> {}",
        short_list(&outcome.open_same_key)
    );
    println!(
        "  find done=false#2 (scan)     -> {}",
        short_list(&outcome.open_fresh_key)
    );
    println!(
        "  delete {}           -> count {} -> {}",
        x.yellow(),
        outcome.count_before_delete,
        outcome.count_after_delete
    );
    println!("  find_all                     -> {}", short_list(&outcome.remaining));
    println!("  full scans: {}", outcome.full_scans.to_string().bold());
    println!("{} Scenario complete.", "✓".green().bold());
    Ok(())
}

// ---- validate ----

#[derive(Debug, Serialize)]
struct ValidationReport {
    valid: bool,
    violations: Vec<String>,
}

fn validate_entity(args: &ValidateArgs) -> anyhow::Result<ValidationReport> {
    let schema: Schema = serde_json::from_str(&read_json_arg(&args.schema)?)
        .context("schema is not a valid schema document")?;
    let fields: Fields = serde_json::from_str(&read_json_arg(&args.entity)?)
        .context("entity must be a JSON object")?;
    let violations = rindex_schema::validate(&fields, &schema, &args.collection);
    Ok(ValidationReport {
        valid: violations.is_empty(),
        violations: violations.iter().map(ToString::to_string).collect(),
    })
}

fn cmd_validate(args: ValidateArgs, format: OutputFormat) -> anyhow::Result<()> {
    let report = validate_entity(&args)?;
    if format == OutputFormat::Json {
        print_json(&report)?;
    } else if report.valid {
        println!("{} Entity is valid for {}", "✓".green().bold(), args.collection.bold());
    } else {
        println!("{} {} violation(s):", "✗".red().bold(), report.violations.len());
        for violation in &report.violations {
            println!("  {}", violation.red());
        }
    }
    if !report.valid {
        anyhow::bail!("entity does not match schema");
    }
    Ok(())
}

// ---- check-config ----

#[derive(Debug, Serialize)]
struct ConfigSummary {
    name: String,
    log_level: String,
    repositories: Vec<RepositorySummary>,
    steps: Vec<StepSummary>,
}

#[derive(Debug, Serialize)]
struct RepositorySummary {
    name: String,
    collection: String,
    strict_population: bool,
    schema_fields: Vec<String>,
}

#[derive(Debug, Serialize)]
struct StepSummary {
    name: String,
    elapsed_us: u64,
}

async fn summarize_config(args: &CheckConfigArgs) -> anyhow::Result<ConfigSummary> {
    let config = RuntimeConfig::load(&args.path)
        .with_context(|| format!("loading {}", args.path.display()))?;
    let runtime = Runtime::start(config).await?;

    let repositories = runtime
        .repository_names()
        .into_iter()
        .filter_map(|name| runtime.repository(name))
        .map(|repo| RepositorySummary {
            name: repo.name().to_string(),
            collection: repo.collection().to_string(),
            strict_population: repo.config().strict_population,
            schema_fields: repo.schema().fields().map(|(name, _)| name.to_string()).collect(),
        })
        .collect();
    let steps = runtime
        .report()
        .steps
        .iter()
        .filter(|s| s.outcome == StepOutcome::Completed)
        .map(|s| StepSummary {
            name: s.step_name.clone(),
            elapsed_us: s.elapsed.as_micros() as u64,
        })
        .collect();

    Ok(ConfigSummary {
        name: runtime.config().name.clone(),
        log_level: runtime.config().log_level.clone(),
        repositories,
        steps,
    })
}

async fn cmd_check_config(args: CheckConfigArgs, format: OutputFormat) -> anyhow::Result<()> {
    let summary = summarize_config(&args).await?;
    if format == OutputFormat::Json {
        return print_json(&summary);
    }

    println!(
        "{} {} (log level {})",
        "✓".green().bold(),
        summary.name.bold(),
        summary.log_level.cyan()
    );
    for step in &summary.steps {
        println!("  {} {} ({}us)", "step".dimmed(), step.name, step.elapsed_us);
    }
    if summary.repositories.is_empty() {
        println!("No collections configured.");
    }
    for repo in &summary.repositories {
        let strict = if repo.strict_population { " strict" } else { "" };
        println!(
            "  {} -> {}:*{}  [{}]",
            repo.name.yellow().bold(),
            repo.collection,
            strict.cyan(),
            repo.schema_fields.join(", ")
        );
    }
    Ok(())
}
