// src/codec/schema.rs

//! Flag schema shared by the encoding (host) and decoding (child) sides.

use std::collections::HashSet;

use crate::errors::{Result, TaskrelayError};

/// One recognised flag.
///
/// A flag always has a parameter `name`. It is spelled on the command line
/// as `-<short>` when a short form is set, and is always accepted as
/// `--<long>` (which defaults to the parameter name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSpec {
    pub name: String,
    pub short: Option<char>,
    pub long: Option<String>,
    pub required: bool,
    pub default: Option<String>,
}

impl FlagSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            short: None,
            long: None,
            required: false,
            default: None,
        }
    }

    pub fn short(mut self, c: char) -> Self {
        self.short = Some(c);
        self
    }

    pub fn long(mut self, long: impl Into<String>) -> Self {
        self.long = Some(long.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Build a spec from a flag-table entry such as `("port", "-p")` or
    /// `("port", "--port")`.
    pub fn from_flag(name: &str, flag: &str) -> Result<Self> {
        if let Some(long) = flag.strip_prefix("--") {
            if long.is_empty() || long.starts_with('-') || long.contains('=') {
                return Err(bad_flag(name, flag));
            }
            return Ok(FlagSpec::new(name).long(long));
        }

        let mut chars = flag.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some('-'), Some(c), None) if c != '-' => Ok(FlagSpec::new(name).short(c)),
            _ => Err(bad_flag(name, flag)),
        }
    }

    /// Long spelling without the leading dashes.
    pub fn long_name(&self) -> &str {
        self.long.as_deref().unwrap_or(&self.name)
    }

    /// The token `encode` emits for this flag.
    pub fn preferred_flag(&self) -> String {
        match self.short {
            Some(c) => format!("-{c}"),
            None => format!("--{}", self.long_name()),
        }
    }

    /// Human-readable spelling for error messages, e.g. `-p/--port`.
    pub fn display_flag(&self) -> String {
        match self.short {
            Some(c) => format!("-{c}/--{}", self.long_name()),
            None => format!("--{}", self.long_name()),
        }
    }
}

fn bad_flag(name: &str, flag: &str) -> TaskrelayError {
    TaskrelayError::Encoding(format!(
        "parameter '{name}' has malformed flag '{flag}' (expected -x or --name)"
    ))
}

/// Ordered set of flags recognised by a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgSchema {
    flags: Vec<FlagSpec>,
}

impl ArgSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag(mut self, spec: FlagSpec) -> Self {
        self.flags.push(spec);
        self
    }

    /// Build a schema from a plain `name -> flag` table; all flags optional.
    pub fn from_flag_table(table: &[(&str, &str)]) -> Result<Self> {
        let mut schema = ArgSchema::new();
        for (name, flag) in table {
            schema.flags.push(FlagSpec::from_flag(name, flag)?);
        }
        schema.check()?;
        Ok(schema)
    }

    /// Verify that names and spellings are unique.
    pub fn check(&self) -> Result<()> {
        let mut names = HashSet::new();
        let mut shorts = HashSet::new();
        let mut longs = HashSet::new();

        for spec in &self.flags {
            if spec.name.is_empty() {
                return Err(TaskrelayError::Encoding(
                    "flag schema contains an empty parameter name".to_string(),
                ));
            }
            if !names.insert(spec.name.as_str()) {
                return Err(TaskrelayError::Encoding(format!(
                    "parameter '{}' is declared twice in the flag schema",
                    spec.name
                )));
            }
            if let Some(c) = spec.short {
                if !shorts.insert(c) {
                    return Err(TaskrelayError::Encoding(format!(
                        "flag '-{c}' is used by more than one parameter"
                    )));
                }
            }
            if !longs.insert(spec.long_name()) {
                return Err(TaskrelayError::Encoding(format!(
                    "flag '--{}' is used by more than one parameter",
                    spec.long_name()
                )));
            }
        }

        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FlagSpec> {
        self.flags.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlagSpec> {
        self.flags.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}
