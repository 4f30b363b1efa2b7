//! goalrunner - goal-driven task planning loop
//!
//! CLI entry point: parse arguments, wire up the capabilities, run the loop.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::info;

use goalrunner::cli::{Cli, Command};
use goalrunner::config::Config;
use goalrunner::console::{ConsoleInput, ConsoleOutput, FileSink};
use goalrunner::llm::create_client;
use goalrunner::manager::{Capabilities, ManagerOptions, TaskManager};
use goalrunner::prompts::PromptLoader;
use goalrunner::state::{FileStore, StateStore};
use goalrunner::tools;

fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("goalrunner")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Write to a log file, not stdout: run output owns the console
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(log_dir.join("goalrunner.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        "Loaded config: provider={}, model={}",
        config.llm.provider, config.llm.model
    );

    match cli.command {
        Command::Run {
            goal,
            tools,
            persist,
            max_cycles,
            no_repeat_tasks,
            confirm,
        } => {
            cmd_run(
                &config,
                &goal,
                tools.as_deref(),
                persist,
                max_cycles,
                no_repeat_tasks,
                confirm,
            )
            .await
        }
        Command::Tools { file } => cmd_tools(&file),
    }
}

/// Drive a goal to completion
async fn cmd_run(
    config: &Config,
    goal: &str,
    tools_file: Option<&std::path::Path>,
    persist: Option<PathBuf>,
    max_cycles: Option<u32>,
    no_repeat_tasks: bool,
    confirm: bool,
) -> Result<()> {
    // Fail fast on a missing API key before any wiring
    config.validate()?;

    let tool_specs = match tools_file {
        Some(path) => {
            let specs = tools::load_from_file(path)?;
            println!("Loaded {} tools from {}", specs.len(), path.display());
            specs
        }
        None => Vec::new(),
    };

    let llm = create_client(&config.llm).context("Failed to create LLM client")?;

    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let prompts = PromptLoader::new(&cwd);

    let mut options = ManagerOptions::from_config(config);
    if let Some(max) = max_cycles {
        options.max_cycles = max;
    }
    if no_repeat_tasks {
        options.allow_repeat_tasks = false;
    }
    if confirm {
        options.confirm_execution = true;
    }

    let caps = Capabilities {
        output: Arc::new(ConsoleOutput::new(true)),
        input: Arc::new(ConsoleInput::new()?),
        sink: Arc::new(FileSink::new(&cwd)),
        store: persist.map(|path| Arc::new(FileStore::new(path)) as Arc<dyn StateStore>),
    };

    let manager = TaskManager::new(goal, &tool_specs, llm, prompts, caps, options)?;

    println!("Running goal: {}", goal.bold());
    println!();

    let outcome = manager.run().await?;

    println!();
    println!(
        "{} goal finished after {} cycles",
        "✓".bright_green(),
        outcome.cycles
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::Value::Object(outcome.final_result))?
    );

    Ok(())
}

/// Print the tool listing as it will appear in prompts
fn cmd_tools(file: &std::path::Path) -> Result<()> {
    let specs = tools::load_from_file(file)?;

    if specs.is_empty() {
        println!("No tools found in {}", file.display());
        return Ok(());
    }

    println!("{}", tools::listing(&specs));
    Ok(())
}
