// src/registry/table.rs

//! The registry table: at most one active launch per task handle.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::errors::{Result, TaskrelayError};
use crate::exec::{ProcessHandle, ProcessLauncher, ProcessState};
use crate::registry::record::{ProcessRecord, TaskEvent};
use crate::task::TaskDescriptor;
use crate::types::TaskHandle;

/// How long retired records stay queryable by default.
pub const DEFAULT_RETAIN_EXITED: Duration = Duration::from_secs(5);

/// Internal entry for a task that has not been retired yet.
///
/// `process` is `None` while the launch is in flight (`Starting`).
struct LiveEntry {
    record: ProcessRecord,
    process: Option<ProcessHandle>,
    cancel_requested: bool,
}

#[derive(Default)]
struct Table {
    live: HashMap<TaskHandle, LiveEntry>,
    retired: HashMap<TaskHandle, ProcessRecord>,
    /// Every handle that has finished at least once; outlives `retired`.
    finished: HashSet<TaskHandle>,
    pending: Vec<TaskEvent>,
}

enum CancelAction {
    Deferred,
    Terminate(ProcessHandle),
    AlreadyDone,
}

/// Process-wide table of launched tasks, owned by the host.
///
/// Cloning is cheap and shares the same table. Every mutation goes through a
/// single mutex, which is what keeps "one active launch per handle" true
/// under concurrent callers. No method waits on a child process.
#[derive(Clone)]
pub struct TaskRegistry {
    launcher: ProcessLauncher,
    retain_for: Duration,
    table: Arc<Mutex<Table>>,
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("launcher", &self.launcher)
            .field("retain_for", &self.retain_for)
            .finish_non_exhaustive()
    }
}

impl TaskRegistry {
    pub fn new(launcher: ProcessLauncher) -> Self {
        Self {
            launcher,
            retain_for: DEFAULT_RETAIN_EXITED,
            table: Arc::new(Mutex::new(Table::default())),
        }
    }

    /// How long a finished record stays visible to `status`/`cancel`.
    pub fn retain_exited_for(mut self, retain_for: Duration) -> Self {
        self.retain_for = retain_for;
        self
    }

    pub fn launcher(&self) -> &ProcessLauncher {
        &self.launcher
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Launch `descriptor` under `handle`.
    ///
    /// Fails with `DuplicateTask` while a previous launch under the same
    /// handle is still starting or running.
    pub fn start(&self, handle: TaskHandle, descriptor: TaskDescriptor) -> Result<ProcessHandle> {
        {
            let mut table = self.lock();

            if let Some(entry) = table.live.get_mut(&handle) {
                refresh(entry);
                if entry.record.state.is_active() {
                    warn!(task = %handle, state = %entry.record.state, "launch refused; task already active");
                    return Err(TaskrelayError::DuplicateTask(handle.to_string()));
                }
            }

            // Finished but not yet picked up by `poll`: retire it now so the
            // new launch gets a fresh record.
            if let Some(previous) = table.live.remove(&handle) {
                let event = TaskEvent::finished(handle.clone(), &previous.record.state);
                table.pending.extend(event);
                table.finished.insert(handle.clone());
            }

            table.retired.remove(&handle);
            table.live.insert(
                handle.clone(),
                LiveEntry {
                    record: ProcessRecord::starting(handle.clone(), descriptor.clone()),
                    process: None,
                    cancel_requested: false,
                },
            );
        }

        // Spawning happens outside the lock; the Starting entry already
        // blocks concurrent launches of the same handle.
        let launched = self.launcher.launch_labelled(handle.as_str(), &descriptor);

        let mut table = self.lock();
        let process = match launched {
            Ok(process) => process,
            Err(err) => {
                table.live.remove(&handle);
                return Err(err);
            }
        };

        let cancel_requested = match table.live.get_mut(&handle) {
            Some(entry) => {
                entry.record.state = ProcessState::Running;
                entry.record.pid = process.pid();
                entry.process = Some(process.clone());
                entry.cancel_requested
            }
            None => false,
        };
        table.pending.push(TaskEvent::Started {
            handle: handle.clone(),
            pid: process.pid(),
        });
        drop(table);

        info!(task = %handle, pid = ?process.pid(), "task running");

        if cancel_requested {
            debug!(task = %handle, "cancel arrived during launch; terminating");
            if let Err(e) = self.launcher.terminate(&process) {
                warn!(task = %handle, error = %e, "deferred cancel failed");
            }
        }

        Ok(process)
    }

    /// Current state of `handle`, including recently retired tasks.
    pub fn status(&self, handle: &TaskHandle) -> Result<ProcessState> {
        let mut table = self.lock();
        if let Some(entry) = table.live.get_mut(handle) {
            refresh(entry);
            return Ok(entry.record.state.clone());
        }
        table
            .retired
            .get(handle)
            .map(|record| record.state.clone())
            .ok_or_else(|| TaskrelayError::NotFound(handle.to_string()))
    }

    /// Snapshot of the record for `handle`.
    pub fn record(&self, handle: &TaskHandle) -> Option<ProcessRecord> {
        let table = self.lock();
        table
            .live
            .get(handle)
            .map(|entry| entry.record.clone())
            .or_else(|| table.retired.get(handle).cloned())
    }

    /// Ask the task to stop.
    ///
    /// Advisory: the record only moves to `Exited`/`Failed` once a later
    /// [`TaskRegistry::poll`] observes the exit. Cancelling a task that has
    /// already finished is a no-op, even after its record was purged;
    /// handles this registry never launched are `NotFound`.
    pub fn cancel(&self, handle: &TaskHandle) -> Result<()> {
        let action = {
            let mut guard = self.lock();
            let table = &mut *guard;
            match table.live.get_mut(handle) {
                Some(entry) => match &entry.process {
                    None => {
                        entry.cancel_requested = true;
                        CancelAction::Deferred
                    }
                    Some(process) => CancelAction::Terminate(process.clone()),
                },
                None if table.retired.contains_key(handle) || table.finished.contains(handle) => {
                    CancelAction::AlreadyDone
                }
                None => return Err(TaskrelayError::NotFound(handle.to_string())),
            }
        };

        match action {
            CancelAction::Deferred => {
                debug!(task = %handle, "cancel recorded for a launch in flight");
                Ok(())
            }
            CancelAction::Terminate(process) => {
                info!(task = %handle, "cancelling task");
                self.launcher.terminate(&process)
            }
            CancelAction::AlreadyDone => {
                debug!(task = %handle, "cancel on finished task; nothing to do");
                Ok(())
            }
        }
    }

    /// Request termination of every active task.
    pub fn cancel_all(&self) {
        for handle in self.active() {
            if let Err(e) = self.cancel(&handle) {
                warn!(task = %handle, error = %e, "failed to cancel task");
            }
        }
    }

    /// Completion detection: poll every live child once, retire the ones
    /// that finished, drop expired retired records, and return what changed
    /// since the last call.
    pub fn poll(&self) -> Vec<TaskEvent> {
        let now = Instant::now();
        let mut table = self.lock();
        let mut events = std::mem::take(&mut table.pending);

        let mut finished = Vec::new();
        for (handle, entry) in table.live.iter_mut() {
            if entry.process.is_none() {
                continue;
            }
            refresh(entry);
            if let Some(event) = TaskEvent::finished(handle.clone(), &entry.record.state) {
                events.push(event);
                finished.push(handle.clone());
            }
        }

        for handle in finished {
            if let Some(entry) = table.live.remove(&handle) {
                debug!(task = %handle, state = %entry.record.state, "retiring task");
                table.finished.insert(handle.clone());
                table.retired.insert(handle, entry.record);
            }
        }

        let retain_for = self.retain_for;
        table.retired.retain(|_, record| {
            record
                .exited_at
                .is_some_and(|at| now.duration_since(at) < retain_for)
        });

        events
    }

    /// Handles that are starting or running.
    pub fn active(&self) -> Vec<TaskHandle> {
        let table = self.lock();
        let mut handles: Vec<_> = table
            .live
            .iter()
            .filter(|(_, entry)| entry.record.state.is_active())
            .map(|(handle, _)| handle.clone())
            .collect();
        handles.sort();
        handles
    }

    /// True when nothing is live and no events are waiting to be polled.
    pub fn is_idle(&self) -> bool {
        let table = self.lock();
        table.live.is_empty() && table.pending.is_empty()
    }
}

/// Update a live record from its process without blocking.
fn refresh(entry: &mut LiveEntry) {
    let Some(process) = &entry.process else {
        return;
    };
    if entry.record.state.is_finished() {
        return;
    }
    let state = process.poll();
    if state.is_finished() {
        entry.record.exited_at = Some(Instant::now());
    }
    entry.record.state = state;
}
