//! CLI argument definitions for the viewsync workbench.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "viewsync",
    version,
    about = "viewsync workbench - inspect and exercise dataset synchronization",
    long_about = "Load a workspace of named datasets from CSV files into the reference\n\
                  in-memory store, then display them, inspect the entity-relationship\n\
                  fan-out map, validate the configuration, or run a scripted\n\
                  mutation-and-refresh cycle."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load one dataset and print its formatted table.
    Show(ShowArgs),

    /// Print the entity-relationship fan-out map.
    Relations(RelationsArgs),

    /// Validate a workspace config and print a summary report.
    Doctor(DoctorArgs),

    /// Run a scripted mutation and refresh cycle against CSV data.
    Demo(DemoArgs),
}

#[derive(Parser)]
pub struct ShowArgs {
    /// Dataset name to display.
    #[arg(value_name = "DATASET")]
    pub dataset: String,

    /// Path to the workspace config file.
    #[arg(long = "config", value_name = "FILE")]
    pub config: PathBuf,

    /// Directory containing one <table>.csv per dataset.
    #[arg(long = "data-dir", value_name = "DIR")]
    pub data_dir: PathBuf,
}

#[derive(Parser)]
pub struct RelationsArgs {
    /// Entity kind to look up; all kinds are listed when omitted.
    #[arg(value_name = "ENTITY")]
    pub entity: Option<String>,

    /// Path to the workspace config file.
    #[arg(long = "config", value_name = "FILE")]
    pub config: PathBuf,
}

#[derive(Parser)]
pub struct DoctorArgs {
    /// Path to the workspace config file.
    #[arg(long = "config", value_name = "FILE")]
    pub config: PathBuf,

    /// Emit the report as JSON instead of a table.
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Parser)]
pub struct DemoArgs {
    /// Path to the workspace config file.
    #[arg(long = "config", value_name = "FILE")]
    pub config: PathBuf,

    /// Directory containing one <table>.csv per dataset.
    #[arg(long = "data-dir", value_name = "DIR")]
    pub data_dir: PathBuf,

    /// Entity kind whose mutation the demo simulates.
    #[arg(long = "entity", value_name = "KIND")]
    pub entity: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
