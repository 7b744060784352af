// src/registry/mod.rs

//! Task registry.
//!
//! - [`table`] owns the handle -> process table and its locking.
//! - [`record`] defines the per-launch record and lifecycle events.

pub mod record;
pub mod table;

pub use record::{ProcessRecord, TaskEvent};
pub use table::{DEFAULT_RETAIN_EXITED, TaskRegistry};
