//! Command-line front end for validating, explaining, and running forum searches.
#![forbid(unsafe_code)]

use std::error::Error;
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use nu_ansi_term::Color;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use forumql::query::forum::forum_schema;
use forumql::query::{
    validate_with, CompiledQuery, Expression, InMemorySchema, InMemoryStore, SearchError,
    SearchExecutor, SearchRequest,
};
use forumql::SearchOptions;

#[derive(Parser, Debug)]
#[command(
    name = "forumql",
    version,
    about = "Validate, explain, and run forum search filters",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "FORUMQL_CONFIG",
        help = "Search limits file (TOML)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for results"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a filter and check its structure
    Validate(ValidateCmd),
    /// Print the compiled query for a request
    Explain(ExplainCmd),
    /// Run a request against a JSON dataset
    Search(SearchCmd),
}

#[derive(Args, Debug)]
struct ValidateCmd {
    #[arg(value_name = "FILE", help = "JSON filter expression")]
    filter: PathBuf,
}

#[derive(Args, Debug)]
struct TargetArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Schema document (.json or .toml); the built-in forum schema when omitted"
    )]
    schema: Option<PathBuf>,

    #[arg(long, help = "Root entity to search (e.g. Post)")]
    entity: String,

    #[arg(long, value_name = "FILE", help = "JSON search request")]
    request: PathBuf,
}

#[derive(Args, Debug)]
struct ExplainCmd {
    #[command(flatten)]
    target: TargetArgs,
}

#[derive(Args, Debug)]
struct SearchCmd {
    #[command(flatten)]
    target: TargetArgs,

    #[arg(long, value_name = "FILE", help = "JSON dataset keyed by entity name")]
    data: PathBuf,

    #[arg(long, help = "Skip the total count query")]
    no_total: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct ValidateReport {
    valid: bool,
    filter: String,
}

#[derive(Serialize)]
struct ExplainReport {
    root: String,
    joins: Vec<String>,
    predicate: Option<String>,
    sorts: Vec<String>,
}

impl From<&CompiledQuery> for ExplainReport {
    fn from(query: &CompiledQuery) -> Self {
        Self {
            root: query.root.clone(),
            joins: query.joins.iter().map(|join| join.path.clone()).collect(),
            predicate: query.predicate.as_ref().map(ToString::to_string),
            sorts: query
                .sorts
                .iter()
                .map(|key| format!("{} {:?}", key.column.path, key.direction))
                .collect(),
        }
    }
}

fn main() {
    install_tracing_subscriber();
    if let Err(err) = run() {
        let tty = std::io::stderr().is_terminal();
        match err.downcast_ref::<SearchError>() {
            Some(search) => {
                let tag = format!("error[{}]", search.code());
                eprintln!("{}: {search}", label(&tag, Color::Red, tty));
            }
            None => eprintln!("{}: {err}", label("error", Color::Red, tty)),
        }
        std::process::exit(1);
    }
}

fn install_tracing_subscriber() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("forumql=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let options = SearchOptions::discover(cli.config.as_deref())?;
    match cli.command {
        Command::Validate(cmd) => {
            let expr = Expression::from_json(&read(&cmd.filter)?).map_err(SearchError::from)?;
            validate_with(&expr, &options).map_err(SearchError::from)?;
            let report = ValidateReport {
                valid: true,
                filter: expr.to_string(),
            };
            emit(cli.format, &report, || {
                let tty = std::io::stdout().is_terminal();
                println!("{}: {}", label("ok", Color::Green, tty), report.filter);
            })
        }
        Command::Explain(cmd) => {
            let schema = load_schema(cmd.target.schema.as_deref())?;
            let request = load_request(&cmd.target.request)?;
            let store = InMemoryStore::new();
            let plan = SearchExecutor::with_options(&schema, &store, options)
                .plan(&cmd.target.entity, &request)?;
            emit(cli.format, &ExplainReport::from(&plan), || print!("{plan}"))
        }
        Command::Search(cmd) => {
            let schema = load_schema(cmd.target.schema.as_deref())?;
            let request = load_request(&cmd.target.request)?;
            let data: serde_json::Value = serde_json::from_str(&read(&cmd.data)?)?;
            let store = InMemoryStore::from_json(&schema, &data).map_err(SearchError::from)?;
            let want_total = !cmd.no_total && options.include_total_by_default;
            let executor = SearchExecutor::with_options(&schema, &store, options);
            let result = executor
                .search_with(&cmd.target.entity, &request, want_total)?
                .map(|record| record.to_json());
            emit(cli.format, &result, || {
                for item in &result.items {
                    println!("{item}");
                }
                if let Some(total) = result.total_count {
                    let tty = std::io::stdout().is_terminal();
                    println!("{}: {total}", label("total", Color::Cyan, tty));
                }
            })
        }
    }
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: FnOnce(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn label(text: &str, color: Color, paint: bool) -> String {
    if paint {
        color.bold().paint(text).to_string()
    } else {
        text.to_owned()
    }
}

fn read(path: &Path) -> Result<String, Box<dyn Error>> {
    fs::read_to_string(path).map_err(|err| format!("failed to read {}: {err}", path.display()).into())
}

fn load_request(path: &Path) -> Result<SearchRequest, Box<dyn Error>> {
    Ok(SearchRequest::from_json(&read(path)?).map_err(SearchError::from)?)
}

fn load_schema(path: Option<&Path>) -> Result<InMemorySchema, Box<dyn Error>> {
    let Some(path) = path else {
        return Ok(forum_schema());
    };
    let text = read(path)?;
    let schema = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => InMemorySchema::from_toml(&text)?,
        _ => InMemorySchema::from_json(&text)?,
    };
    if let Some((entity, field, target)) = schema.dangling_references().first() {
        return Err(format!("{entity}.{field} refers to unknown entity '{target}'").into());
    }
    Ok(schema)
}
