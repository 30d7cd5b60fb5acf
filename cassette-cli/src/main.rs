//! Cassette CLI - record, replay and inspect snapshot documents

use anyhow::{Context, Result};
use cassette_core::prelude::*;
use cassette_core::snapshot;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cassette")]
#[command(about = "Record an object's behavior and replay it offline", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to cassette.toml and CASSETTE_* variables)
    #[arg(long, global = true, env = "CASSETTE_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a chain of operations against a JSON file and record them
    Record {
        /// JSON document to proxy
        #[arg(short, long)]
        input: PathBuf,
        /// Where to write the snapshot document
        #[arg(short, long)]
        output: PathBuf,
        /// Recording policy
        #[arg(short, long, value_enum, default_value_t = RecordMode::Keep)]
        mode: RecordMode,
        /// Operations, e.g. `getattr:bugs getitem:0 len`
        #[arg(required = true)]
        steps: Vec<String>,
    },
    /// Replay a chain of operations from a snapshot document
    Replay {
        /// Snapshot document written by `record`
        #[arg(short, long)]
        document: PathBuf,
        /// Operations, e.g. `getattr:bugs getitem:0 len`
        #[arg(required = true)]
        steps: Vec<String>,
    },
    /// Print the recorded tree of a snapshot document
    Inspect {
        /// Snapshot document
        document: PathBuf,
    },
    /// Version information
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum RecordMode {
    /// Always call the subject, keep the latest answer
    Keep,
    /// Reuse answers already recorded in this run
    Use,
}

impl From<RecordMode> for CacheMode {
    fn from(mode: RecordMode) -> Self {
        match mode {
            RecordMode::Keep => CacheMode::RecordOnly,
            RecordMode::Use => CacheMode::RecordAndReuse,
        }
    }
}

/// Core errors may hold proxy handles, which are not `Send`; keep their text only
fn plain<T>(result: cassette_core::error::Result<T>) -> Result<T> {
    result.map_err(|err| anyhow::anyhow!("{}", err))
}

fn load_config(path: Option<&Path>) -> Result<CassetteConfig> {
    match path {
        Some(path) => plain(CassetteConfig::from_file(path))
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => plain(CassetteConfig::load()).context("Failed to load configuration"),
    }
}

fn parse_steps(steps: &[String]) -> Result<Vec<Step>> {
    steps
        .iter()
        .map(|text| plain(text.parse::<Step>()).with_context(|| format!("Invalid step `{}`", text)))
        .collect()
}

fn print_resolved(resolved: &Resolved) -> Result<()> {
    match resolved {
        Resolved::Data(value) => println!("{}", serde_json::to_string_pretty(value)?),
        Resolved::Proxy(proxy) => print!("{}", snapshot::outline(proxy)),
        Resolved::List(items) => {
            for item in items {
                print_resolved(item)?;
            }
        }
    }
    Ok(())
}

fn record(
    engine: &Engine,
    input: &Path,
    output: &Path,
    mode: RecordMode,
    steps: &[String],
) -> Result<()> {
    let steps = parse_steps(steps)?;
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let data: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", input.display()))?;

    engine.set_cache_mode(mode.into());
    let proxy = engine.proxy(JsonSubject::new(data));
    let result = run_chain(&proxy, &steps);

    // Failures are part of the recording, so the document is written either way
    let document = plain(engine.serialize(&proxy))?;
    std::fs::write(output, document)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    tracing::info!(
        output = %output.display(),
        entries = proxy.entry_count(),
        "snapshot written"
    );

    print_resolved(&plain(result)?)
}

fn replay(engine: &Engine, document: &Path, steps: &[String]) -> Result<()> {
    let steps = parse_steps(steps)?;
    let text = std::fs::read_to_string(document)
        .with_context(|| format!("Failed to read {}", document.display()))?;

    engine.set_cache_mode(CacheMode::ReplayOnly);
    let ghost = plain(engine.deserialize(&text))
        .with_context(|| format!("Failed to load snapshot {}", document.display()))?;

    let result = plain(run_chain(&ghost, &steps))?;
    print_resolved(&result)
}

fn inspect(engine: &Engine, document: &Path) -> Result<()> {
    let text = std::fs::read_to_string(document)
        .with_context(|| format!("Failed to read {}", document.display()))?;
    let ghost = plain(engine.deserialize(&text))
        .with_context(|| format!("Failed to load snapshot {}", document.display()))?;
    print!("{}", snapshot::outline(&ghost));
    Ok(())
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("cassette {}", env!("CARGO_PKG_VERSION"));
        println!("cassette-core {}", cassette_core::VERSION);
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    let engine = Engine::from_config(&config);

    match cli.command {
        Commands::Record {
            input,
            output,
            mode,
            steps,
        } => record(&engine, &input, &output, mode, &steps),
        Commands::Replay { document, steps } => replay(&engine, &document, &steps),
        Commands::Inspect { document } => inspect(&engine, &document),
        Commands::Version => Ok(()),
    }
}
