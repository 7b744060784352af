// src/config/model.rs

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::codec::{ArgSchema, FlagSpec, Parameters};
use crate::errors::Result;
use crate::task::TaskDescriptor;
use crate::types::{HumanDuration, ParamValue};

/// Configuration exactly as read from a TOML file.
///
/// ```toml
/// [config]
/// listen = "127.0.0.1:7000"
/// tick_interval = "100ms"
///
/// [task.udp-sender-1]
/// executable = "python3"
/// script = "scripts/udp_sender.py"
/// params = [
///   { name = "port", flag = "-p", value = 7000 },
///   { name = "loop", flag = "-l", value = 10 },
/// ]
/// ```
///
/// Turn it into a [`ConfigFile`] with `ConfigFile::try_from`, which validates.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// All tasks from `[task.<handle>]`, keyed by handle.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// A validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub listen: Option<SocketAddr>,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    /// Build without validation; `validate.rs` is the only caller.
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        listen: Option<SocketAddr>,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self {
            config,
            listen,
            task,
        }
    }

    /// Descriptors for every task, in handle order.
    ///
    /// Relative working directories are taken relative to `base_dir`
    /// (normally the directory holding the config file), which is also the
    /// working directory of tasks that don't set one.
    pub fn descriptors(&self, base_dir: &Path) -> Result<Vec<(String, TaskDescriptor)>> {
        self.task
            .iter()
            .map(|(name, task)| Ok((name.clone(), task.to_descriptor(Some(base_dir))?)))
            .collect()
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Result listener address; no listener when absent.
    #[serde(default)]
    pub listen: Option<String>,

    /// Pause between two host ticks.
    #[serde(default = "default_tick_interval")]
    pub tick_interval: HumanDuration,

    /// SIGTERM -> SIGKILL delay used when cancelling.
    #[serde(default = "default_grace_period")]
    pub grace_period: HumanDuration,

    /// How long finished tasks stay queryable.
    #[serde(default = "default_retain_exited")]
    pub retain_exited: HumanDuration,

    /// Forward child stdout/stderr into the log.
    #[serde(default = "default_log_output")]
    pub log_output: bool,
}

fn default_tick_interval() -> HumanDuration {
    HumanDuration(Duration::from_millis(100))
}

fn default_grace_period() -> HumanDuration {
    HumanDuration(Duration::from_secs(2))
}

fn default_retain_exited() -> HumanDuration {
    HumanDuration(Duration::from_secs(5))
}

fn default_log_output() -> bool {
    true
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            listen: None,
            tick_interval: default_tick_interval(),
            grace_period: default_grace_period(),
            retain_exited: default_retain_exited(),
            log_output: default_log_output(),
        }
    }
}

/// `[task.<handle>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Interpreter or binary; looked up in `PATH` when it has no separator.
    pub executable: String,

    /// Script passed as the first argument.
    #[serde(default)]
    pub script: Option<PathBuf>,

    /// Fixed arguments placed after the script and before the parameters.
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub workdir: Option<PathBuf>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Parameters in the order they are passed.
    #[serde(default)]
    pub params: Vec<ParamConfig>,
}

/// One entry of `params = [...]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamConfig {
    pub name: String,
    /// `-x` or `--name`.
    pub flag: String,
    pub value: ParamValue,
}

impl TaskConfig {
    /// Flag schema implied by `params`.
    pub fn schema(&self) -> Result<ArgSchema> {
        let mut schema = ArgSchema::new();
        for param in &self.params {
            schema = schema.flag(FlagSpec::from_flag(&param.name, &param.flag)?);
        }
        schema.check()?;
        Ok(schema)
    }

    pub fn parameters(&self) -> Parameters {
        self.params
            .iter()
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect()
    }

    /// Build the descriptor; `base_dir` anchors relative working directories.
    pub fn to_descriptor(&self, base_dir: Option<&Path>) -> Result<TaskDescriptor> {
        let mut builder = TaskDescriptor::builder(self.executable.clone())
            .args(self.args.iter().cloned())
            .parameters(self.parameters())
            .schema(self.schema()?);

        if let Some(script) = &self.script {
            builder = builder.script(script.clone());
        }

        let workdir = match (&self.workdir, base_dir) {
            (Some(dir), Some(base)) if dir.is_relative() => Some(base.join(dir)),
            (Some(dir), _) => Some(dir.clone()),
            (None, base) => base.map(Path::to_path_buf),
        };
        if let Some(dir) = workdir {
            builder = builder.working_dir(dir);
        }

        for (k, v) in &self.env {
            builder = builder.env(k.clone(), v.clone());
        }

        builder.build()
    }
}
