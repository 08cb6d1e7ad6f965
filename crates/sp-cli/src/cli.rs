//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Sparkport - convert Hive and Trino SQL to Databricks SQL
#[derive(Parser, Debug)]
#[command(name = "sparkport")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress progress output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert every source unit in the source directory
    Convert(ConvertArgs),

    /// Execute converted statements against the SQL warehouse
    Integrate(IntegrateArgs),

    /// List the rewrite rules in application order
    Rules(RulesArgs),
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// JSON report on stdout
    Json,
}

/// Arguments for the convert command
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Override source directory
    #[arg(short, long)]
    pub source_dir: Option<String>,

    /// Override output directory
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Treat every source file as this dialect (hive, trino)
    #[arg(short, long)]
    pub dialect: Option<String>,

    /// Number of statements converted concurrently
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Rewrite pass ceiling
    #[arg(long)]
    pub max_passes: Option<usize>,

    /// Validate with the offline parser instead of the SQL warehouse
    #[arg(long)]
    pub offline: bool,

    /// Never escalate to AI conversion
    #[arg(long)]
    pub no_ai: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the integrate command
#[derive(Args, Debug)]
pub struct IntegrateArgs {
    /// Override output directory holding the outcome records
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Number of source units executed concurrently
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Drop the tables created by each unit after it has run
    #[arg(long)]
    pub cleanup: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the rules command
#[derive(Args, Debug)]
pub struct RulesArgs {
    /// Only list rules for this dialect (hive, trino)
    #[arg(short, long)]
    pub dialect: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
