// src/registry/record.rs

use std::time::Instant;

use crate::exec::ProcessState;
use crate::task::TaskDescriptor;
use crate::types::TaskHandle;

/// What the registry knows about one launch of a task.
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    pub handle: TaskHandle,
    pub descriptor: TaskDescriptor,
    pub state: ProcessState,
    pub pid: Option<u32>,
    pub started_at: Instant,
    pub exited_at: Option<Instant>,
}

impl ProcessRecord {
    pub(crate) fn starting(handle: TaskHandle, descriptor: TaskDescriptor) -> Self {
        Self {
            handle,
            descriptor,
            state: ProcessState::Starting,
            pid: None,
            started_at: Instant::now(),
            exited_at: None,
        }
    }
}

/// Lifecycle transitions observed by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Started { handle: TaskHandle, pid: Option<u32> },
    Exited { handle: TaskHandle, code: i32 },
    Failed { handle: TaskHandle, reason: String },
}

impl TaskEvent {
    /// Event for a process that reached a final state; `None` otherwise.
    pub(crate) fn finished(handle: TaskHandle, state: &ProcessState) -> Option<Self> {
        match state {
            ProcessState::Exited(code) => Some(TaskEvent::Exited {
                handle,
                code: *code,
            }),
            ProcessState::Failed(reason) => Some(TaskEvent::Failed {
                handle,
                reason: reason.clone(),
            }),
            ProcessState::Starting | ProcessState::Running => None,
        }
    }

    pub fn handle(&self) -> &TaskHandle {
        match self {
            TaskEvent::Started { handle, .. }
            | TaskEvent::Exited { handle, .. }
            | TaskEvent::Failed { handle, .. } => handle,
        }
    }
}
