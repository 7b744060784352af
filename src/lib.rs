// src/lib.rs

pub mod channel;
pub mod cli;
pub mod codec;
pub mod config;
pub mod emit;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod registry;
pub mod task;
pub mod types;

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, error, warn};

use crate::channel::ResultSender;
use crate::cli::{CliArgs, Command, RunArgs, SendArgs};
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::{HostRuntime, RunSummary, RuntimeOptions, TaskHost};
use crate::exec::{LauncherOptions, ProcessLauncher};
use crate::registry::TaskRegistry;
use crate::task::TaskDescriptor;
use crate::types::TaskHandle;

/// High-level entry point used by `main.rs`.
///
/// Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    match args.command {
        Command::Run(run_args) => run_host(run_args).await,
        Command::Send(send_args) => run_send(send_args),
        Command::Emit { args } => run_emit(args).await,
    }
}

/// `taskrelay run`: launch configured tasks and collect their results.
///
/// This wires together:
/// - config loading
/// - launcher / registry / result listener
/// - the tick loop
/// - Ctrl-C handling
async fn run_host(args: RunArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("failed to load config '{}'", config_path.display()))?;

    let root_dir = config_root_dir(&config_path);
    let tasks = select_tasks(&cfg, &root_dir, args.task.as_deref())?;

    if args.dry_run {
        print_dry_run(&cfg, &tasks);
        return Ok(0);
    }

    let launcher = ProcessLauncher::new(LauncherOptions {
        grace_period: cfg.config.grace_period.0,
        log_output: cfg.config.log_output,
    });
    let registry = TaskRegistry::new(launcher).retain_exited_for(cfg.config.retain_exited.0);
    let mut host = TaskHost::new(registry);

    if let Some(addr) = cfg.listen {
        host.listen(addr)?;
    }

    let mut failed_to_start = 0usize;
    for (handle, descriptor) in &tasks {
        if let Err(e) = host.start(handle.clone(), descriptor) {
            error!(task = %handle, error = %e, "task failed to start");
            failed_to_start += 1;
        }
    }

    let options = RuntimeOptions {
        tick_interval: cfg.config.tick_interval.0,
        exit_when_idle: args.once,
    };
    let runtime = HostRuntime::new(host, options);

    let summary = runtime.run(ctrl_c()).await;
    Ok(exit_code(&summary, failed_to_start))
}

/// `taskrelay send`: one datagram, exit 0 whether or not anyone listened.
fn run_send(args: SendArgs) -> Result<i32> {
    let sender = match (args.addr, args.port) {
        (Some(addr), _) => ResultSender::new(addr),
        (None, Some(port)) => {
            let ip: IpAddr = args
                .host
                .parse()
                .with_context(|| format!("invalid --host '{}'", args.host))?;
            ResultSender::new(SocketAddr::new(ip, port))
        }
        (None, None) => ResultSender::from_env()
            .context("no target: pass --port or --addr, or run under `taskrelay run`")?,
    };

    if !sender.send(&args.message) {
        warn!(target_addr = %sender.target(), "message was not sent");
    }
    Ok(0)
}

/// `taskrelay emit`: the demo sender loop.
async fn run_emit(argv: Vec<String>) -> Result<i32> {
    let decoded = codec::decode_or_exit("taskrelay emit", &argv, &emit::schema());
    let options = match emit::EmitOptions::from_args(&decoded) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("taskrelay emit: {e}");
            return Ok(codec::USAGE_EXIT_CODE);
        }
    };
    emit::run(&options).await;
    Ok(0)
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}

/// Figure out the directory relative paths in the config refer to.
///
/// - If the config path has a non-empty parent (e.g. "configs/Taskrelay.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Taskrelay.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn select_tasks(
    cfg: &ConfigFile,
    root_dir: &Path,
    only: Option<&str>,
) -> Result<Vec<(TaskHandle, TaskDescriptor)>> {
    if let Some(name) = only {
        if !cfg.task.contains_key(name) {
            bail!("no task named '{name}' in config");
        }
    }

    let mut tasks = Vec::new();
    for (name, desc) in cfg.descriptors(root_dir)? {
        if only.is_none_or(|o| o == name) {
            tasks.push((name.parse::<TaskHandle>()?, desc));
        }
    }
    Ok(tasks)
}

fn exit_code(summary: &RunSummary, failed_to_start: usize) -> i32 {
    if failed_to_start == 0 && summary.all_succeeded() { 0 } else { 1 }
}

/// Simple dry-run output: print tasks and the command line each would get.
fn print_dry_run(cfg: &ConfigFile, tasks: &[(TaskHandle, TaskDescriptor)]) {
    println!("taskrelay dry-run");
    match cfg.listen {
        Some(addr) => println!("  config.listen = {addr}"),
        None => println!("  config.listen = (none)"),
    }
    println!("  config.tick_interval = {:?}", cfg.config.tick_interval.0);
    println!("  config.grace_period = {:?}", cfg.config.grace_period.0);
    println!();

    println!("tasks ({}):", tasks.len());
    for (handle, desc) in tasks {
        println!("  - {handle}");
        println!("      executable: {}", desc.executable());
        println!("      argv: {:?}", desc.argv());
        if let Some(dir) = desc.working_dir() {
            println!("      workdir: {}", dir.display());
        }
        if !desc.env().is_empty() {
            println!("      env: {:?}", desc.env());
        }
    }

    debug!("dry-run complete (no execution)");
}
