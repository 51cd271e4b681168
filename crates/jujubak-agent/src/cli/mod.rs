/// Command-line interface module for the jujubak agent.
pub mod commands;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI configuration structure.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a configuration file layered over the embedded defaults
    #[arg(long, global = true, env = "JUJUBAK_CONFIG")]
    pub config: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Provision the backup user, directories, cron schedule and monitoring check
    Setup,
    /// Execute a scheduled backup run
    Run {
        /// Log at debug level for this run
        #[arg(long)]
        debug: bool,
        /// Purge backup artifacts older than this many days after the run
        #[arg(long, value_name = "DAYS")]
        purge: Option<u32>,
        /// Per-task timeout in seconds handed to the backup tool
        #[arg(long, value_name = "SECONDS")]
        task_timeout: Option<u64>,
        /// Controller to omit from this run (repeatable)
        #[arg(long = "omit-controller", value_name = "NAME")]
        omit_controllers: Vec<String>,
    },
    /// Push the operator ssh key to every model of every configured controller
    PushKeys,
    /// Nagios-style check over the results file written by `run`
    CheckResults {
        /// Results file location (defaults to the one under the state root)
        #[arg(long, value_name = "PATH")]
        results_file: Option<PathBuf>,
        /// Age in hours beyond which the last run is considered stale
        #[arg(long, value_name = "HOURS", default_value_t = 26)]
        max_age_hours: i64,
    },
}

/// Parses command-line arguments into the Cli structure.
pub fn parse_cli() -> Cli {
    Cli::parse()
}
