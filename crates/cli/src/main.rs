//! Drover CLI - Main Entry Point
//!
//! Executes drovefiles against live HTTP endpoints.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use drover_runner::{Executor, PromptWaiter, ReqwestDispatcher, RhaiEngine, ScriptEngine, State};
use drovefile::Phase;

/// Drover - declarative HTTP integration testing
#[derive(Parser)]
#[command(name = "drover")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Drovefiles or directories to execute
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Skip a lifecycle phase (setup, setup-each, tests, teardown-each, teardown)
    #[arg(long, value_name = "PHASE")]
    skip: Vec<String>,

    /// Parse and validate only, execute nothing
    #[arg(long)]
    dry: bool,

    /// Never abort on request failures
    #[arg(long)]
    no_abort: bool,

    /// Wait for ENTER before each request dispatch
    #[arg(short, long)]
    gradual: bool,

    /// Initial parameter as key=value (repeatable)
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// JSON file with initial parameters
    #[arg(long, value_name = "FILE")]
    params_file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let skip = parse_phases(&cli.skip)?;
    let initial = initial_params(&cli)?;

    let mut executor = Executor::new(
        Box::new(|| Box::new(RhaiEngine::new()) as Box<dyn ScriptEngine>),
        Box::new(ReqwestDispatcher),
    );
    executor.dry = cli.dry;
    executor.no_abort = cli.no_abort;
    executor.skip = skip;
    if cli.gradual {
        executor.waiter = Box::new(PromptWaiter);
    }

    match executor.execute(&cli.paths, initial).await {
        Ok(()) => {
            println!("{}", "execution finished successfully".green().bold());
            Ok(())
        }
        Err(err) => {
            eprintln!("{}", format!("execution failed: {err}").red().bold());
            std::process::exit(1);
        }
    }
}

fn parse_phases(names: &[String]) -> Result<Vec<Phase>> {
    names
        .iter()
        .map(|name| {
            Phase::from_name(&name.to_ascii_lowercase())
                .with_context(|| format!("unknown phase '{name}'"))
        })
        .collect()
}

/// Assembles the initial engine state: the params file first, then
/// `--param` overrides on top.
fn initial_params(cli: &Cli) -> Result<State> {
    let mut state = State::new();

    if let Some(path) = &cli.params_file {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading params file {}", path.display()))?;
        let parsed: serde_json::Value = serde_json::from_str(&data)
            .with_context(|| format!("failed parsing params file {}", path.display()))?;
        match parsed {
            serde_json::Value::Object(map) => state.extend(map),
            _ => bail!("params file {} must hold a JSON object", path.display()),
        }
    }

    for param in &cli.params {
        let (key, value) = param
            .split_once('=')
            .with_context(|| format!("invalid parameter '{param}', expected key=value"))?;
        // Values that parse as JSON keep their type; everything else
        // stays a plain string.
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        state.insert(key.to_string(), value);
    }

    Ok(state)
}
