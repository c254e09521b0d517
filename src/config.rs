//! Environment-driven configuration

use thiserror::Error;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_WORKERS: usize = 4;
const DEFAULT_QUEUE_CAPACITY: usize = 64;
const DEFAULT_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub port: u16,
    pub workers: usize,
    pub queue_capacity: usize,
    pub slack_token: String,
    pub slack_api_base: String,
    /// Resolved through `auth.test` when unset
    pub bot_user_id: Option<String>,
    /// Request signature checks are skipped when unset
    pub signing_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let db_path = var("CANVASS_DB_PATH").unwrap_or_else(|| {
            let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
            format!("{home}/.canvass/canvass.db")
        });

        let port = match var("CANVASS_PORT") {
            Some(value) => parse("CANVASS_PORT", &value)?,
            None => match var("PORT") {
                Some(value) => parse("PORT", &value)?,
                None => DEFAULT_PORT,
            },
        };

        let workers = var("CANVASS_WORKERS")
            .map(|v| parse_positive("CANVASS_WORKERS", &v))
            .transpose()?
            .unwrap_or(DEFAULT_WORKERS);

        let queue_capacity = var("CANVASS_QUEUE_CAPACITY")
            .map(|v| parse_positive("CANVASS_QUEUE_CAPACITY", &v))
            .transpose()?
            .unwrap_or(DEFAULT_QUEUE_CAPACITY);

        let slack_token = var("SLACK_BOT_TOKEN").ok_or(ConfigError::Missing("SLACK_BOT_TOKEN"))?;

        Ok(Self {
            db_path,
            port,
            workers,
            queue_capacity,
            slack_token,
            slack_api_base: var("SLACK_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            bot_user_id: var("SLACK_BOT_USER_ID"),
            signing_secret: var("SLACK_SIGNING_SECRET"),
        })
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

fn parse_positive(name: &'static str, value: &str) -> Result<usize, ConfigError> {
    match parse(name, value)? {
        0 => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        }),
        n => Ok(n),
    }
}
