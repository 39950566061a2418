// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Separator between pipeline stages in the trailing command.
pub const STAGE_SEPARATOR: &str = "::";

/// Command-line arguments for `shellwire`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "shellwire",
    version,
    about = "Run a program, or a pipeline of programs, through the shellwire engine.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `SHELLWIRE_CONFIG`, else `Shellwire.toml` in the current
    /// working directory. A missing file means built-in defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SHELLWIRE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Fail when any stage exits nonzero.
    #[arg(long)]
    pub errexit: bool,

    /// Capture the last stage's output and print it line by line.
    #[arg(long)]
    pub capture: bool,

    /// Line written to the first stage's stdin. Repeatable.
    #[arg(long = "input", value_name = "LINE")]
    pub input: Vec<String>,

    /// Export `KEY=VALUE` to every stage. Repeatable.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Resolve every stage and print it, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Program and arguments; `::` starts the next pipeline stage.
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, _)) if key.is_empty() => Err(format!("empty variable name in '{s}'")),
        Some((key, value)) => Ok((key.to_string(), value.to_string())),
        None => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

/// Split the trailing command into pipeline stages.
///
/// Every stage must name a program; `a :: :: b` and a trailing `::` are
/// rejected.
pub fn split_stages(command: &[String]) -> Result<Vec<Vec<String>>, String> {
    let stages: Vec<Vec<String>> = command
        .split(|word| word == STAGE_SEPARATOR)
        .map(|stage| stage.to_vec())
        .collect();
    if stages.iter().any(|stage| stage.is_empty()) {
        return Err(format!("empty pipeline stage around '{STAGE_SEPARATOR}'"));
    }
    Ok(stages)
}
