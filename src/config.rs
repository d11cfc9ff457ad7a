//! Environment-driven configuration.

use crate::llm::PollPolicy;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DATABASE_VAR: &str = "INSIGHT_DATABASE";
pub const API_URL_VAR: &str = "LLAMALITH_API_URL";
pub const API_TOKEN_VAR: &str = "LLAMALITH_API_TOKEN";
pub const MODEL_VAR: &str = "LLAMALITH_MODEL";
pub const POLL_ATTEMPTS_VAR: &str = "LLM_POLL_ATTEMPTS";
pub const POLL_INTERVAL_VAR: &str = "LLM_POLL_INTERVAL_SECS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub database: PathBuf,
    pub api_url: String,
    pub api_token: Option<String>,
    pub model: String,
    pub poll: PollPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from("insight.duckdb"),
            api_url: "http://localhost:8000".to_owned(),
            api_token: None,
            model: "mistral-7b-instruct".to_owned(),
            poll: PollPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from `lookup`, falling back to defaults for unset or
    /// empty variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|value| value.trim().to_owned()).filter(|value| !value.is_empty());
        let defaults = Self::default();
        let attempts = match get(POLL_ATTEMPTS_VAR) {
            Some(value) => parse(POLL_ATTEMPTS_VAR, &value, "a positive integer")
                .and_then(|attempts: u32| positive(POLL_ATTEMPTS_VAR, attempts))?,
            None => defaults.poll.attempts,
        };
        let interval = match get(POLL_INTERVAL_VAR) {
            Some(value) => Duration::from_secs(parse(POLL_INTERVAL_VAR, &value, "a number of seconds")?),
            None => defaults.poll.interval,
        };
        Ok(Self {
            database: get(DATABASE_VAR).map(PathBuf::from).unwrap_or(defaults.database),
            api_url: get(API_URL_VAR).unwrap_or(defaults.api_url),
            api_token: get(API_TOKEN_VAR),
            model: get(MODEL_VAR).unwrap_or(defaults.model),
            poll: PollPolicy { attempts, interval },
        })
    }
}

fn parse<T: FromStr>(key: &str, value: &str, expected: &'static str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_owned(),
        value: value.to_owned(),
        expected,
    })
}

fn positive(key: &str, value: u32) -> Result<u32, ConfigError> {
    if value == 0 {
        Err(ConfigError::InvalidValue {
            key: key.to_owned(),
            value: value.to_string(),
            expected: "a positive integer",
        })
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        assert_eq!(config(&[]).unwrap(), Config::default());
        assert_eq!(config(&[(API_TOKEN_VAR, "")]).unwrap().api_token, None);
    }

    #[test]
    fn overrides() {
        let config = config(&[
            (DATABASE_VAR, "/tmp/x.duckdb"),
            (API_URL_VAR, "http://llm:9000"),
            (API_TOKEN_VAR, "secret"),
            (MODEL_VAR, "llama3"),
            (POLL_ATTEMPTS_VAR, "5"),
            (POLL_INTERVAL_VAR, "0"),
        ])
        .unwrap();
        assert_eq!(config.database, PathBuf::from("/tmp/x.duckdb"));
        assert_eq!(config.api_url, "http://llm:9000");
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.model, "llama3");
        assert_eq!(config.poll, PollPolicy { attempts: 5, interval: Duration::ZERO });
    }

    #[test]
    fn invalid_numbers() {
        for pairs in [[(POLL_ATTEMPTS_VAR, "many")], [(POLL_ATTEMPTS_VAR, "0")], [(POLL_INTERVAL_VAR, "-1")]] {
            match config(&pairs) {
                Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, pairs[0].0),
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }
}
