// src/task/mod.rs

//! Task descriptions: what to run, with which arguments, where.

pub mod descriptor;
pub mod resolve;

pub use descriptor::{ResolvedCommand, TaskDescriptor, TaskDescriptorBuilder};
pub use resolve::resolve_executable;
