// src/codec/encode.rs

//! Host side: structured parameters -> argv tokens.

use std::collections::HashSet;

use crate::codec::schema::ArgSchema;
use crate::errors::{Result, TaskrelayError};
use crate::types::ParamValue;

/// Ordered parameter list as provided by the caller.
///
/// Iteration order is the order of insertion; the codec never reorders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    pairs: Vec<(String, ParamValue)>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.pairs.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.pairs.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Parameters
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Parameters::new();
        for (k, v) in iter {
            params.push(k, v);
        }
        params
    }
}

/// Flatten `parameters` into `flag value` token pairs.
///
/// Fails if a parameter is unknown to the schema, given twice, cannot be
/// rendered as text, or if a required parameter is missing.
pub fn encode(parameters: &Parameters, schema: &ArgSchema) -> Result<Vec<String>> {
    let mut argv = Vec::with_capacity(parameters.len() * 2);
    let mut seen = HashSet::new();

    for (name, value) in parameters.iter() {
        let spec = schema.get(name).ok_or_else(|| {
            TaskrelayError::Encoding(format!("parameter '{name}' has no flag in the schema"))
        })?;

        if !seen.insert(name) {
            return Err(TaskrelayError::Encoding(format!(
                "parameter '{name}' is given more than once"
            )));
        }

        let token = value.to_arg().ok_or_else(|| {
            TaskrelayError::Encoding(format!(
                "value '{value}' of parameter '{name}' cannot be passed as an argument"
            ))
        })?;

        argv.push(spec.preferred_flag());
        argv.push(token);
    }

    if let Some(missing) = schema
        .iter()
        .find(|spec| spec.required && !seen.contains(spec.name.as_str()))
    {
        return Err(TaskrelayError::Encoding(format!(
            "required parameter '{}' ({}) is missing",
            missing.name,
            missing.display_flag()
        )));
    }

    Ok(argv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::schema::FlagSpec;

    fn sender_schema() -> ArgSchema {
        ArgSchema::from_flag_table(&[("port", "-p"), ("interval", "-i"), ("loop", "-l")]).unwrap()
    }

    #[test]
    fn encodes_in_caller_order() {
        let params = Parameters::new()
            .with("loop", 10)
            .with("port", 5000)
            .with("interval", 2);

        let argv = encode(&params, &sender_schema()).unwrap();
        assert_eq!(argv, vec!["-l", "10", "-p", "5000", "-i", "2"]);
    }

    #[test]
    fn multi_word_values_stay_single_tokens() {
        let schema = ArgSchema::new().flag(FlagSpec::new("subject").long("subject"));
        let params = Parameters::new().with("subject", "hello from the host");

        let argv = encode(&params, &schema).unwrap();
        assert_eq!(argv, vec!["--subject", "hello from the host"]);
    }

    #[test]
    fn missing_required_parameter_is_an_error() {
        let schema = ArgSchema::new()
            .flag(FlagSpec::new("port").short('p').required())
            .flag(FlagSpec::new("loop").short('l'));
        let params = Parameters::new().with("loop", 3);

        match encode(&params, &schema) {
            Err(TaskrelayError::Encoding(msg)) => {
                assert!(msg.contains("port"));
                assert!(msg.contains("-p/--port"));
            }
            other => panic!("expected Encoding error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_duplicate_and_non_finite_values_are_errors() {
        let schema = sender_schema();

        let unknown = Parameters::new().with("host", "localhost");
        assert!(matches!(
            encode(&unknown, &schema),
            Err(TaskrelayError::Encoding(_))
        ));

        let twice = Parameters::new().with("port", 1).with("port", 2);
        assert!(matches!(
            encode(&twice, &schema),
            Err(TaskrelayError::Encoding(_))
        ));

        let nan = Parameters::new().with("interval", f64::INFINITY);
        assert!(matches!(
            encode(&nan, &schema),
            Err(TaskrelayError::Encoding(_))
        ));
    }

    #[test]
    fn empty_parameters_encode_to_empty_argv() {
        let argv = encode(&Parameters::new(), &ArgSchema::new()).unwrap();
        assert!(argv.is_empty());
    }
}
