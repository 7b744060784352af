#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use taskrelay::config::{ConfigFile, ConfigSection, ParamConfig, RawConfigFile, TaskConfig};
use taskrelay::types::ParamValue;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_listen(mut self, addr: &str) -> Self {
        self.config.config.listen = Some(addr.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(executable: &str) -> Self {
        Self {
            task: TaskConfig {
                executable: executable.to_string(),
                script: None,
                args: vec![],
                workdir: None,
                env: BTreeMap::new(),
                params: vec![],
            },
        }
    }

    pub fn script(mut self, path: impl Into<PathBuf>) -> Self {
        self.task.script = Some(path.into());
        self
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.task.args.push(arg.to_string());
        self
    }

    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.task.workdir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.task.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn param(mut self, name: &str, flag: &str, value: impl Into<ParamValue>) -> Self {
        self.task.params.push(ParamConfig {
            name: name.to_string(),
            flag: flag.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
