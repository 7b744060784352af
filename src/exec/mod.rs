// src/exec/mod.rs

//! Process execution layer.
//!
//! Tasks run as separate OS processes started with `tokio::process::Command`
//! from an argv vector (never a shell string). The process boundary is the
//! isolation mechanism: the host keeps a [`ProcessHandle`] and polls it.
//!
//! - [`launcher`] validates descriptors and spawns processes.
//! - [`process`] holds the handle, its state machine and termination.
//! - [`output`] drains child stdout/stderr into the log.

pub mod launcher;
pub mod output;
pub mod process;

pub use launcher::{DEFAULT_GRACE_PERIOD, LauncherOptions, ProcessLauncher};
pub use process::{ProcessHandle, ProcessState};
