// src/config/validate.rs

use std::net::SocketAddr;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, TaskrelayError};
use crate::types::TaskHandle;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::TaskrelayError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let listen = parse_listen(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, listen, raw.task))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_tasks(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(TaskrelayError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.tick_interval.0.is_zero() {
        return Err(TaskrelayError::ConfigError(
            "[config].tick_interval must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn parse_listen(cfg: &RawConfigFile) -> Result<Option<SocketAddr>> {
    cfg.config
        .listen
        .as_deref()
        .map(|raw| {
            raw.trim().parse::<SocketAddr>().map_err(|e| {
                TaskrelayError::ConfigError(format!(
                    "[config].listen = '{raw}' is not a socket address: {e}"
                ))
            })
        })
        .transpose()
}

fn validate_tasks(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        name.parse::<TaskHandle>()?;

        // Building the descriptor runs the argument codec, so bad flags,
        // duplicate parameters and unusable values are caught here.
        task.to_descriptor(None).map_err(|e| {
            TaskrelayError::ConfigError(format!("task '{name}': {e}"))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(toml_src)?;
        ConfigFile::try_from(raw)
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = parse(
            r#"
[task.noop]
executable = "sh"
"#,
        )
        .unwrap();

        assert!(cfg.listen.is_none());
        assert_eq!(cfg.config.tick_interval.0.as_millis(), 100);
        assert_eq!(cfg.config.grace_period.0.as_secs(), 2);
        assert!(cfg.config.log_output);
    }

    #[test]
    fn empty_config_is_rejected() {
        let err = parse("[config]\nlisten = \"127.0.0.1:7000\"\n").unwrap_err();
        assert!(matches!(err, TaskrelayError::ConfigError(msg) if msg.contains("at least one")));
    }

    #[test]
    fn bad_listen_address_is_rejected() {
        let err = parse(
            r#"
[config]
listen = "localhost"

[task.a]
executable = "sh"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, TaskrelayError::ConfigError(msg) if msg.contains("listen")));
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let err = parse(
            r#"
[config]
tick_interval = "0ms"

[task.a]
executable = "sh"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, TaskrelayError::ConfigError(_)));
    }

    #[test]
    fn malformed_flags_are_reported_with_task_name() {
        let err = parse(
            r#"
[task.sender]
executable = "python3"
params = [ { name = "port", flag = "p", value = 7000 } ]
"#,
        )
        .unwrap_err();
        match err {
            TaskrelayError::ConfigError(msg) => {
                assert!(msg.contains("task 'sender'"));
                assert!(msg.contains("malformed flag"));
            }
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_flags_are_rejected() {
        let err = parse(
            r#"
[task.sender]
executable = "python3"
params = [
  { name = "port", flag = "-p", value = 7000 },
  { name = "path", flag = "-p", value = "out.txt" },
]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, TaskrelayError::ConfigError(msg) if msg.contains("-p")));
    }

    #[test]
    fn unknown_keys_are_rejected_by_serde() {
        let raw: std::result::Result<RawConfigFile, _> = toml::from_str(
            r#"
[task.a]
executable = "sh"
comand = "typo"
"#,
        );
        assert!(raw.is_err());
    }
}
