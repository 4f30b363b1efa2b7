//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// goalrunner - goal-driven task planning loop
#[derive(Parser)]
#[command(
    name = "gr",
    about = "Goal-driven task planning loop",
    version,
    after_help = "Logs are written to: ~/.local/share/goalrunner/logs/goalrunner.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Drive a goal to completion
    Run {
        /// Final goal in natural language
        goal: String,

        /// YAML file of tool descriptors ({name, description} entries)
        #[arg(short, long)]
        tools: Option<PathBuf>,

        /// Persist run state to this JSON file
        #[arg(short, long)]
        persist: Option<PathBuf>,

        /// Maximum execute+refine cycles
        #[arg(long)]
        max_cycles: Option<u32>,

        /// Skip tasks that were already completed
        #[arg(long)]
        no_repeat_tasks: bool,

        /// Ask before executing each task
        #[arg(long)]
        confirm: bool,
    },

    /// Print the tool listing rendered from a descriptor file
    Tools {
        /// YAML file of tool descriptors
        file: PathBuf,
    },
}
