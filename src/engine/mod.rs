// src/engine/mod.rs

//! Host integration.
//!
//! - [`host`] bundles the registry and result listener behind a
//!   non-blocking `tick()` for hosts that run their own loop.
//! - [`runtime`] is a ready-made async loop around `tick()`, used by the
//!   `taskrelay run` command.

use std::time::Duration;

use crate::channel::Message;
use crate::registry::TaskEvent;

/// Default pause between two ticks of [`HostRuntime`].
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Everything a tick can report to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A result datagram arrived.
    Message(Message),
    /// A task started, exited or failed.
    Task(TaskEvent),
}

/// Options for the async runtime loop.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    pub tick_interval: Duration,
    /// Stop once no task is live and nothing is left to report
    /// (used for `--once`).
    pub exit_when_idle: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            exit_when_idle: false,
        }
    }
}

pub mod host;
pub mod runtime;

pub use host::TaskHost;
pub use runtime::{HostRuntime, RunSummary};
