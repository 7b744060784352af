// src/exec/process.rs

//! A running (or finished) child process and its non-blocking controls.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::errors::{Result, TaskrelayError};

/// Lifecycle of a launched process.
///
/// `Starting -> Running -> Exited(code) | Failed(reason)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessState {
    Starting,
    Running,
    /// Exit code; `-1` when the process was ended by a signal.
    Exited(i32),
    Failed(String),
}

impl ProcessState {
    /// `Starting` or `Running`.
    pub fn is_active(&self) -> bool {
        matches!(self, ProcessState::Starting | ProcessState::Running)
    }

    pub fn is_finished(&self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Starting => f.write_str("starting"),
            ProcessState::Running => f.write_str("running"),
            ProcessState::Exited(code) => write!(f, "exited({code})"),
            ProcessState::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

struct ChildSlot {
    child: Child,
    outcome: Option<ProcessState>,
    terminating: bool,
}

/// Cloneable handle to one child process.
///
/// None of the methods wait for the child: `poll` uses `try_wait`, and
/// `terminate` only sends signals and schedules escalation.
#[derive(Clone)]
pub struct ProcessHandle {
    label: Arc<str>,
    pid: Option<u32>,
    slot: Arc<Mutex<ChildSlot>>,
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("label", &self.label)
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

impl ProcessHandle {
    pub(crate) fn new(label: &str, child: Child) -> Self {
        let pid = child.id();
        Self {
            label: Arc::from(label),
            pid,
            slot: Arc::new(Mutex::new(ChildSlot {
                child,
                outcome: None,
                terminating: false,
            })),
        }
    }

    /// OS process id, if the process was still alive when it was spawned.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Non-blocking exit check.
    pub fn poll(&self) -> ProcessState {
        let mut slot = lock(&self.slot);
        poll_slot(&self.label, &mut slot)
    }

    /// Ask the process to stop; force-kill it after `grace`.
    ///
    /// Terminating a process that already exited is a no-op. The state
    /// change is only observed by a later [`ProcessHandle::poll`].
    pub fn terminate(&self, grace: Duration) -> Result<()> {
        {
            let mut slot = lock(&self.slot);
            if poll_slot(&self.label, &mut slot).is_finished() {
                debug!(task = %self.label, "terminate on finished process; nothing to do");
                return Ok(());
            }
            if slot.terminating {
                debug!(task = %self.label, "termination already requested");
                return Ok(());
            }
            slot.terminating = true;

            if !send_sigterm(self.pid) {
                info!(task = %self.label, pid = ?self.pid, "killing process");
                return slot.child.start_kill().map_err(|e| TaskrelayError::Launch {
                    task: self.label.to_string(),
                    reason: format!("failed to kill process: {e}"),
                });
            }
            info!(
                task = %self.label,
                pid = ?self.pid,
                grace_ms = grace.as_millis() as u64,
                "sent SIGTERM; will force-kill after grace period"
            );
        }

        let slot = Arc::clone(&self.slot);
        let label = Arc::clone(&self.label);
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                rt.spawn(async move {
                    tokio::time::sleep(grace).await;
                    force_kill_if_alive(&label, &slot);
                });
            }
            Err(_) => {
                debug!(task = %self.label, "no Tokio runtime for escalation; killing now");
                force_kill_if_alive(&self.label, &self.slot);
            }
        }

        Ok(())
    }
}

fn lock(slot: &Mutex<ChildSlot>) -> MutexGuard<'_, ChildSlot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn poll_slot(label: &str, slot: &mut ChildSlot) -> ProcessState {
    if let Some(done) = &slot.outcome {
        return done.clone();
    }

    let state = match slot.child.try_wait() {
        Ok(Some(status)) => {
            let code = status.code().unwrap_or(-1);
            info!(
                task = %label,
                exit_code = code,
                success = status.success(),
                "task process exited"
            );
            ProcessState::Exited(code)
        }
        Ok(None) => return ProcessState::Running,
        Err(e) => {
            warn!(task = %label, error = %e, "failed to query process status");
            ProcessState::Failed(format!("status query failed: {e}"))
        }
    };

    slot.outcome = Some(state.clone());
    state
}

fn force_kill_if_alive(label: &str, slot: &Mutex<ChildSlot>) {
    let mut slot = lock(slot);
    if poll_slot(label, &mut slot).is_active() {
        warn!(task = %label, "process ignored SIGTERM; force-killing");
        if let Err(e) = slot.child.start_kill() {
            warn!(task = %label, error = %e, "failed to force-kill process");
        }
    }
}

#[cfg(unix)]
fn send_sigterm(pid: Option<u32>) -> bool {
    let Some(pid) = pid else {
        return false;
    };
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill(2) has no memory-safety preconditions. The pid belongs to
    // a child we have not reaped yet, so it cannot have been recycled.
    unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn send_sigterm(_pid: Option<u32>) -> bool {
    false
}
