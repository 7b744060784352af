//! Throwaway shell scripts for launching real child processes in tests.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use taskrelay::task::TaskDescriptor;

/// A temp directory holding `sh` scripts; removed on drop.
pub struct ScriptDir {
    dir: TempDir,
}

impl ScriptDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `body` to `<dir>/<name>` and return its path.
    pub fn write(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("failed to write script");
        path
    }

    /// Descriptor running `sh <name>` inside this directory.
    pub fn sh_task(&self, name: &str, body: &str) -> TaskDescriptor {
        self.write(name, body);
        TaskDescriptor::builder("sh")
            .script(name)
            .working_dir(self.path())
            .build()
            .expect("failed to build script descriptor")
    }
}

impl Default for ScriptDir {
    fn default() -> Self {
        Self::new()
    }
}

/// `sh -c <command>` without a script file.
pub fn sh_command(command: &str) -> TaskDescriptor {
    TaskDescriptor::builder("sh")
        .arg("-c")
        .arg(command)
        .build()
        .expect("failed to build sh descriptor")
}
