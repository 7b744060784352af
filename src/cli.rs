// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! `run` is the host side. `send` and `emit` are meant to be launched as
//! tasks and talk back to the host over UDP.

use std::net::SocketAddr;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::DEFAULT_CONFIG_FILE;

/// Command-line arguments for `taskrelay`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskrelay",
    version,
    about = "Launch external tasks and collect their results over UDP.",
    long_about = None
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKRELAY_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Launch the tasks of a config file and collect their results.
    Run(RunArgs),

    /// Send one datagram to a result listener and exit.
    Send(SendArgs),

    /// Demo task: send "<i> of <n>" every interval, then "done".
    ///
    /// Arguments are decoded with taskrelay's own flag codec:
    /// `-p/--port <port> [-i/--interval <secs>] [-l/--loop <n>]
    /// [--host <ip>] [--prefix <text>]`.
    Emit {
        #[arg(
            trailing_var_arg = true,
            allow_hyphen_values = true,
            value_name = "ARGS"
        )]
        args: Vec<String>,
    },
}

#[derive(Debug, Clone, clap::Args)]
pub struct RunArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Taskrelay.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Exit once every task has finished instead of waiting for Ctrl-C.
    #[arg(long)]
    pub once: bool,

    /// Launch only this task.
    #[arg(long, value_name = "NAME")]
    pub task: Option<String>,

    /// Parse + validate, print every task's command line, but don't launch.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, clap::Args)]
pub struct SendArgs {
    /// Target port on `--host`.
    #[arg(short, long, conflicts_with = "addr")]
    pub port: Option<u16>,

    /// Full target address. Falls back to `TASKRELAY_RESULT_ADDR` when
    /// neither this nor `--port` is given.
    #[arg(long, value_name = "ADDR")]
    pub addr: Option<SocketAddr>,

    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Payload, sent as UTF-8 text.
    pub message: String,
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

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
