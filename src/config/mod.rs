// src/config/mod.rs

//! Configuration loading and validation for taskrelay.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate tasks and global settings (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{DEFAULT_CONFIG_FILE, load_and_validate, load_from_path, load_with};
pub use model::{ConfigFile, ConfigSection, ParamConfig, RawConfigFile, TaskConfig};
