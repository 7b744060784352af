// src/exec/launcher.rs

//! Starting child processes without waiting for them.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::{Result, TaskrelayError};
use crate::exec::output::forward_lines;
use crate::exec::process::{ProcessHandle, ProcessState};
use crate::fs::{FileSystem, RealFileSystem};
use crate::task::TaskDescriptor;

/// Default delay between SIGTERM and the forced kill.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
pub struct LauncherOptions {
    /// How long `terminate` waits before force-killing.
    pub grace_period: Duration,
    /// Pipe child stdout/stderr into the log (otherwise discard it).
    pub log_output: bool,
}

impl Default for LauncherOptions {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            log_output: true,
        }
    }
}

/// Starts tasks as OS processes.
///
/// `launch` validates the descriptor and spawns synchronously, so a missing
/// executable or an OS refusal is reported immediately; the child itself is
/// never waited on. Must be used from within a Tokio runtime.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    options: LauncherOptions,
    fs: Arc<dyn FileSystem>,
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self::new(LauncherOptions::default())
    }
}

impl ProcessLauncher {
    pub fn new(options: LauncherOptions) -> Self {
        Self {
            options,
            fs: Arc::new(RealFileSystem),
        }
    }

    /// Use another filesystem for executable/script resolution.
    pub fn with_filesystem(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn options(&self) -> &LauncherOptions {
        &self.options
    }

    pub fn launch(&self, descriptor: &TaskDescriptor) -> Result<ProcessHandle> {
        self.launch_labelled(descriptor.executable(), descriptor)
    }

    /// Like [`ProcessLauncher::launch`], tagging logs and errors with `label`.
    pub fn launch_labelled(&self, label: &str, descriptor: &TaskDescriptor) -> Result<ProcessHandle> {
        let launch_err = |reason: String| TaskrelayError::Launch {
            task: label.to_string(),
            reason,
        };

        if tokio::runtime::Handle::try_current().is_err() {
            return Err(launch_err(
                "processes can only be launched from within a Tokio runtime".to_string(),
            ));
        }

        let resolved = descriptor.resolve(self.fs.as_ref()).map_err(|e| match e {
            TaskrelayError::Launch { reason, .. } => launch_err(reason),
            other => other,
        })?;

        let program = absolutize(resolved.program);

        info!(
            task = %label,
            program = %program.display(),
            argv = ?resolved.argv,
            "starting task process"
        );

        let mut cmd = Command::new(&program);
        cmd.args(&resolved.argv)
            .envs(&resolved.env)
            .stdin(Stdio::null())
            .kill_on_drop(false);

        if let Some(dir) = &resolved.working_dir {
            cmd.current_dir(dir);
        }

        if self.options.log_output {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| launch_err(format!("spawning {}: {e}", program.display())))?;

        if let Some(stdout) = child.stdout.take() {
            forward_lines(label.to_string(), "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(label.to_string(), "stderr", stderr);
        }

        let handle = ProcessHandle::new(label, child);
        debug!(task = %label, pid = ?handle.pid(), "task process spawned");
        Ok(handle)
    }

    /// Non-blocking status check.
    pub fn poll(&self, handle: &ProcessHandle) -> ProcessState {
        handle.poll()
    }

    /// Best-effort stop with the configured grace period.
    pub fn terminate(&self, handle: &ProcessHandle) -> Result<()> {
        handle.terminate(self.options.grace_period)
    }
}

fn absolutize(program: PathBuf) -> PathBuf {
    if program.is_absolute() {
        return program;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(program),
        Err(_) => program,
    }
}
