// src/codec/decode.rs

//! Child side: argv tokens -> string-typed parameters.

use std::collections::BTreeMap;
use std::str::FromStr;

use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::codec::schema::{ArgSchema, FlagSpec};
use crate::errors::{Result, TaskrelayError};

/// Exit code used by [`decode_or_exit`]; matches the usual "usage error".
pub const USAGE_EXIT_CODE: i32 = 2;

/// Decoded arguments, keyed by parameter name, in schema order.
///
/// Values are strings: numbers must be re-parsed explicitly with
/// [`DecodedArgs::parse`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedArgs {
    values: Vec<(String, String)>,
}

impl DecodedArgs {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Parse a present value into `T`.
    pub fn parse<T>(&self, name: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.get(name).ok_or_else(|| {
            TaskrelayError::Decoding(format!("parameter '{name}' was not provided"))
        })?;
        raw.parse::<T>().map_err(|e| {
            TaskrelayError::Decoding(format!("invalid value '{raw}' for '{name}': {e}"))
        })
    }

    /// Like [`DecodedArgs::parse`], but `Ok(None)` when the value is absent.
    pub fn parse_opt<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            Some(_) => self.parse(name).map(Some),
            None => Ok(None),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.values.into_iter().collect()
    }
}

/// Parse `argv` (without the program name) against `schema`.
///
/// Accepted spellings: `-x value`, `--long value` and `--long=value`.
/// Unknown flags, flags without a value, stray positional tokens, repeated
/// flags and missing required flags are all decoding errors.
pub fn decode<I, S>(argv: I, schema: &ArgSchema) -> Result<DecodedArgs>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    schema.check()?;
    let matches = command("decode", schema)
        .try_get_matches_from(argv.into_iter().map(|t| t.as_ref().to_string()))
        .map_err(|e| TaskrelayError::Decoding(describe(&e)))?;
    Ok(collect(&matches, schema))
}

/// Decode, or print clap's diagnostic plus usage to stderr and exit with
/// [`USAGE_EXIT_CODE`].
///
/// Intended for launched processes: there is no caller that could recover
/// on their behalf.
pub fn decode_or_exit<I, S>(program: &str, argv: I, schema: &ArgSchema) -> DecodedArgs
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if let Err(err) = schema.check() {
        eprintln!("{program}: {err}");
        std::process::exit(USAGE_EXIT_CODE);
    }
    match command(program, schema)
        .try_get_matches_from(argv.into_iter().map(|t| t.as_ref().to_string()))
    {
        Ok(matches) => collect(&matches, schema),
        Err(err) => err.exit(),
    }
}

/// One `clap` option per flag; help and version flags are left free for
/// the schema to use.
fn command(program: &str, schema: &ArgSchema) -> Command {
    schema.iter().fold(
        Command::new(program.to_string())
            .bin_name(program.to_string())
            .no_binary_name(true)
            .disable_help_flag(true)
            .disable_version_flag(true),
        |cmd, spec| cmd.arg(to_arg(spec)),
    )
}

fn to_arg(spec: &FlagSpec) -> Arg {
    let mut arg = Arg::new(spec.name.clone())
        .long(spec.long_name().to_string())
        .value_name(spec.name.clone())
        .action(ArgAction::Set)
        .allow_hyphen_values(true);
    if let Some(c) = spec.short {
        arg = arg.short(c);
    }
    match &spec.default {
        Some(default) => arg.default_value(default.clone()),
        None => arg.required(spec.required),
    }
}

fn collect(matches: &ArgMatches, schema: &ArgSchema) -> DecodedArgs {
    let values = schema
        .iter()
        .filter_map(|spec| {
            matches
                .get_one::<String>(&spec.name)
                .map(|v| (spec.name.clone(), v.clone()))
        })
        .collect();
    DecodedArgs { values }
}

/// clap's message without the `error:` prefix and the usage footer, on one line.
fn describe(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let body = rendered.split("\n\n").next().unwrap_or(&rendered);
    body.trim()
        .trim_start_matches("error:")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ArgSchema {
        ArgSchema::new()
            .flag(FlagSpec::new("port").short('p').required())
            .flag(FlagSpec::new("interval").short('i').default_value("1"))
            .flag(FlagSpec::new("loop").short('l'))
    }

    #[test]
    fn accepts_short_long_and_inline_spellings() {
        let args = decode(["--loop=4", "-p", "7000", "--interval", "3"], &schema()).unwrap();
        let pairs: Vec<_> = args.iter().collect();
        assert_eq!(pairs, vec![("port", "7000"), ("interval", "3"), ("loop", "4")]);
    }

    #[test]
    fn applies_defaults_and_skips_absent_optionals() {
        let args = decode(["-p", "7000"], &schema()).unwrap();
        assert_eq!(args.get("interval"), Some("1"));
        assert_eq!(args.get("loop"), None);
        assert_eq!(args.parse_opt::<u32>("loop").unwrap(), None);
    }

    #[test]
    fn values_may_look_like_negative_numbers() {
        let args = decode(["-p", "7000", "-l", "-3"], &schema()).unwrap();
        assert_eq!(args.parse::<i32>("loop").unwrap(), -3);
    }

    #[test]
    fn numbers_are_reparsed_explicitly() {
        let args = decode(["-p", "7000", "-i", "0.25"], &schema()).unwrap();
        assert_eq!(args.parse::<u16>("port").unwrap(), 7000);
        assert_eq!(args.parse::<f64>("interval").unwrap(), 0.25);

        let err = args.parse::<u16>("interval").unwrap_err();
        assert!(matches!(err, TaskrelayError::Decoding(msg) if msg.contains("interval")));
    }

    #[test]
    fn missing_required_flag_names_the_flag() {
        match decode(["-l", "2"], &schema()) {
            Err(TaskrelayError::Decoding(msg)) => {
                assert!(msg.contains("required"), "{msg}");
                assert!(msg.contains("--port <port>"), "{msg}");
            }
            other => panic!("expected Decoding error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_argv_is_rejected() {
        let cases: &[&[&str]] = &[
            &["-p"],
            &["-x", "1"],
            &["--nope", "1"],
            &["7000"],
            &["-p", "1", "-p", "2"],
            &["-pp", "1"],
        ];
        for argv in cases {
            assert!(
                matches!(decode(argv.iter(), &schema()), Err(TaskrelayError::Decoding(_))),
                "argv {argv:?} should fail"
            );
        }
    }
}
