// src/task/descriptor.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::codec::{ArgSchema, Parameters, encode};
use crate::errors::{Result, TaskrelayError};
use crate::fs::FileSystem;
use crate::task::resolve::{resolve_executable, resolve_relative};

/// Immutable description of one unit of external work.
///
/// Built with [`TaskDescriptor::builder`]. Parameters are encoded when the
/// descriptor is built, so a descriptor that exists always has a valid
/// argument vector. Changing anything means building a new descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDescriptor {
    executable: String,
    script: Option<PathBuf>,
    args: Vec<String>,
    parameters: Parameters,
    schema: ArgSchema,
    encoded: Vec<String>,
    working_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
}

/// A descriptor whose executable and script were found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub program: PathBuf,
    pub argv: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl TaskDescriptor {
    pub fn builder(executable: impl Into<String>) -> TaskDescriptorBuilder {
        TaskDescriptorBuilder {
            executable: executable.into(),
            script: None,
            args: Vec::new(),
            parameters: Parameters::new(),
            schema: ArgSchema::new(),
            working_dir: None,
            env: BTreeMap::new(),
        }
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn script(&self) -> Option<&Path> {
        self.script.as_deref()
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn schema(&self) -> &ArgSchema {
        &self.schema
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Full argument vector: script, fixed args, then encoded parameters.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(1 + self.args.len() + self.encoded.len());
        if let Some(script) = &self.script {
            argv.push(script.to_string_lossy().into_owned());
        }
        argv.extend(self.args.iter().cloned());
        argv.extend(self.encoded.iter().cloned());
        argv
    }

    /// A copy of this descriptor with additional environment overrides.
    ///
    /// Existing keys set by the caller win over `extra`.
    pub fn with_extra_env<I, K, V>(&self, extra: I) -> TaskDescriptor
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut next = self.clone();
        for (k, v) in extra {
            next.env.entry(k.into()).or_insert_with(|| v.into());
        }
        next
    }

    /// Check that everything the launch needs exists, and produce the
    /// concrete program path and argv.
    pub fn resolve(&self, fs: &dyn FileSystem) -> Result<ResolvedCommand> {
        let launch_err = |reason: String| TaskrelayError::Launch {
            task: self.executable.clone(),
            reason,
        };

        if let Some(dir) = &self.working_dir {
            if !fs.is_dir(dir) {
                return Err(launch_err(format!(
                    "working directory {} does not exist",
                    dir.display()
                )));
            }
        }

        let path_var = self
            .env
            .get("PATH")
            .map(std::ffi::OsString::from)
            .or_else(|| std::env::var_os("PATH"));

        let program = resolve_executable(
            fs,
            &self.executable,
            self.working_dir.as_deref(),
            path_var.as_deref(),
        )
        .ok_or_else(|| launch_err(format!("executable '{}' not found", self.executable)))?;

        if let Some(script) = &self.script {
            let on_disk = resolve_relative(script, self.working_dir.as_deref());
            if !fs.is_file(&on_disk) {
                return Err(launch_err(format!(
                    "script {} does not exist",
                    on_disk.display()
                )));
            }
        }

        Ok(ResolvedCommand {
            program,
            argv: self.argv(),
            working_dir: self.working_dir.clone(),
            env: self.env.clone(),
        })
    }
}

/// Builder for [`TaskDescriptor`].
#[derive(Debug, Clone)]
pub struct TaskDescriptorBuilder {
    executable: String,
    script: Option<PathBuf>,
    args: Vec<String>,
    parameters: Parameters,
    schema: ArgSchema,
    working_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
}

impl TaskDescriptorBuilder {
    pub fn script(mut self, path: impl Into<PathBuf>) -> Self {
        self.script = Some(path.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<crate::types::ParamValue>) -> Self {
        self.parameters.push(name, value);
        self
    }

    pub fn schema(mut self, schema: ArgSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Encode the parameters and freeze the descriptor.
    pub fn build(self) -> Result<TaskDescriptor> {
        if self.executable.trim().is_empty() {
            return Err(TaskrelayError::ConfigError(
                "task executable must not be empty".to_string(),
            ));
        }

        self.schema.check()?;
        let encoded = encode(&self.parameters, &self.schema)?;

        Ok(TaskDescriptor {
            executable: self.executable,
            script: self.script,
            args: self.args,
            parameters: self.parameters,
            schema: self.schema,
            encoded,
            working_dir: self.working_dir,
            env: self.env,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn sender_schema() -> ArgSchema {
        ArgSchema::from_flag_table(&[("port", "-p"), ("interval", "-i"), ("loop", "-l")]).unwrap()
    }

    #[test]
    fn argv_is_script_then_args_then_parameters() {
        let desc = TaskDescriptor::builder("python3")
            .script("scripts/udp_sender.py")
            .arg("--verbose-mode")
            .param("port", 5000)
            .param("loop", 10)
            .schema(sender_schema())
            .build()
            .unwrap();

        assert_eq!(
            desc.argv(),
            vec![
                "scripts/udp_sender.py",
                "--verbose-mode",
                "-p",
                "5000",
                "-l",
                "10"
            ]
        );
    }

    #[test]
    fn build_surfaces_encoding_errors() {
        let err = TaskDescriptor::builder("python3")
            .param("colour", "blue")
            .schema(sender_schema())
            .build()
            .unwrap_err();
        assert!(matches!(err, TaskrelayError::Encoding(_)));

        let err = TaskDescriptor::builder("  ").build().unwrap_err();
        assert!(matches!(err, TaskrelayError::ConfigError(_)));
    }

    #[test]
    fn resolve_finds_executable_on_path_and_script_in_working_dir() {
        let fs = MockFileSystem::new();
        fs.add_file("/usr/bin/runner", "");
        fs.add_file("/work/noop.task", "");

        let desc = TaskDescriptor::builder("runner")
            .script("noop.task")
            .working_dir("/work")
            .env("PATH", "/usr/local/bin:/usr/bin")
            .build()
            .unwrap();

        let resolved = desc.resolve(&fs).unwrap();
        assert_eq!(resolved.program, PathBuf::from("/usr/bin/runner"));
        assert_eq!(resolved.argv, vec!["noop.task"]);
        assert_eq!(resolved.working_dir, Some(PathBuf::from("/work")));
    }

    #[test]
    fn resolve_reports_missing_pieces_as_launch_errors() {
        let fs = MockFileSystem::new();
        fs.add_file("/usr/bin/runner", "");
        fs.add_dir("/work");

        let missing_exe = TaskDescriptor::builder("no-such-runner")
            .env("PATH", "/usr/bin")
            .build()
            .unwrap();
        match missing_exe.resolve(&fs) {
            Err(TaskrelayError::Launch { reason, .. }) => assert!(reason.contains("not found")),
            other => panic!("expected Launch error, got {other:?}"),
        }

        let missing_script = TaskDescriptor::builder("/usr/bin/runner")
            .script("gone.task")
            .working_dir("/work")
            .build()
            .unwrap();
        match missing_script.resolve(&fs) {
            Err(TaskrelayError::Launch { reason, .. }) => assert!(reason.contains("gone.task")),
            other => panic!("expected Launch error, got {other:?}"),
        }

        let missing_dir = TaskDescriptor::builder("/usr/bin/runner")
            .working_dir("/nowhere")
            .build()
            .unwrap();
        assert!(matches!(
            missing_dir.resolve(&fs),
            Err(TaskrelayError::Launch { .. })
        ));
    }

    #[test]
    fn extra_env_does_not_override_caller_values() {
        let desc = TaskDescriptor::builder("runner")
            .env("TASKRELAY_TASK", "mine")
            .build()
            .unwrap();

        let next = desc.with_extra_env([("TASKRELAY_TASK", "host"), ("OTHER", "1")]);
        assert_eq!(next.env().get("TASKRELAY_TASK").map(String::as_str), Some("mine"));
        assert_eq!(next.env().get("OTHER").map(String::as_str), Some("1"));
        assert!(desc.env().get("OTHER").is_none());
    }
}
