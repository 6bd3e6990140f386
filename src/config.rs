use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::consent::DEFAULT_PROMPT_DELAY;

pub const MEASUREMENT_ID_VAR: &str = "CASHFLOW_GA_ID";
pub const PROMPT_DELAY_VAR: &str = "CASHFLOW_PROMPT_DELAY_MS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("CASHFLOW_PROMPT_DELAY_MS must be a whole number of milliseconds, got {0:?}")]
    InvalidPromptDelay(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Analytics measurement id. `None` disables analytics entirely.
    pub measurement_id: Option<String>,
    pub prompt_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            measurement_id: None,
            prompt_delay: DEFAULT_PROMPT_DELAY,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let measurement_id = lookup(MEASUREMENT_ID_VAR)
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        let prompt_delay = match lookup(PROMPT_DELAY_VAR) {
            Some(raw) => {
                let millis = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidPromptDelay(raw.clone()))?;
                Duration::from_millis(millis)
            }
            None => DEFAULT_PROMPT_DELAY,
        };

        Ok(Config {
            measurement_id,
            prompt_delay,
        })
    }
}
