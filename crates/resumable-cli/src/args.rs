use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// CLI arguments for the resumable binary.
#[derive(Parser, Debug)]
#[command(
    name = "resumable",
    version,
    about = "Lower await and yield regions into resumable state machines"
)]
pub struct CliArgs {
    /// JSON expression trees to lower, usually one `resumable` node each.
    #[arg(required = true, value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// Skip the state graph optimizer.
    #[arg(long = "no-optimize", alias = "noOptimize")]
    pub no_optimize: bool,

    /// Output format for lowered machines.
    #[arg(long, value_enum, ignore_case = true, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Path to a resumable.json config file.
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Execute each machine with the reference runtime and print its outcome.
    #[arg(long)]
    pub run: bool,

    /// Disable colored error output.
    #[arg(long = "no-color", alias = "noColor")]
    pub no_color: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Indented listing of scopes, states and dispatch entries.
    Text,
    /// The serialized `LoweredMachine`.
    Json,
}
