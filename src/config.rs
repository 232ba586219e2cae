//! Service configuration loaded from environment variables.
//!
//! Every value has a default; a value that is present but malformed fails
//! startup instead of being silently replaced.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::db::Database;
use crate::identity::DEFAULT_MAX_ATTEMPTS;

const ENV_DB: &str = "CONTACTLINK_DB";
const ENV_BIND: &str = "CONTACTLINK_BIND";
const ENV_PORT: &str = "PORT";
const ENV_MAX_ATTEMPTS: &str = "CONTACTLINK_MAX_ATTEMPTS";
const ENV_LINK_NEW_INFO: &str = "CONTACTLINK_LINK_NEW_INFO";
const ENV_LOG: &str = "CONTACTLINK_LOG";
const ENV_LOG_JSON: &str = "CONTACTLINK_LOG_JSON";

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_LOG_FILTER: &str = "info,contactlink=info";
const MAX_ATTEMPTS_LIMIT: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("could not determine a database location; set {ENV_DB}")]
    NoDatabasePath,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub bind: SocketAddr,
    pub max_attempts: u32,
    pub link_new_info: bool,
    pub log_filter: String,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let db_path = match get(ENV_DB) {
            Some(path) => PathBuf::from(path),
            None => Database::default_path().ok_or(ConfigError::NoDatabasePath)?,
        };

        let bind = match (get(ENV_BIND), get(ENV_PORT)) {
            (Some(bind), _) => parse(ENV_BIND, &bind)?,
            (None, Some(port)) => SocketAddr::from(([0, 0, 0, 0], parse::<u16>(ENV_PORT, &port)?)),
            (None, None) => SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        };

        let max_attempts = match get(ENV_MAX_ATTEMPTS) {
            Some(v) => {
                let n: u32 = parse(ENV_MAX_ATTEMPTS, &v)?;
                if !(1..=MAX_ATTEMPTS_LIMIT).contains(&n) {
                    return Err(ConfigError::Invalid {
                        name: ENV_MAX_ATTEMPTS,
                        value: v,
                        reason: format!("must be between 1 and {MAX_ATTEMPTS_LIMIT}"),
                    });
                }
                n
            }
            None => DEFAULT_MAX_ATTEMPTS,
        };

        let link_new_info = match get(ENV_LINK_NEW_INFO) {
            Some(v) => parse_flag(ENV_LINK_NEW_INFO, &v)?,
            None => false,
        };
        let log_json = match get(ENV_LOG_JSON) {
            Some(v) => parse_flag(ENV_LOG_JSON, &v)?,
            None => false,
        };

        Ok(Self {
            db_path,
            bind,
            max_attempts,
            link_new_info,
            log_filter: get(ENV_LOG).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            log_json,
        })
    }
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}
