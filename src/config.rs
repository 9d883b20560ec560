use std::env;
use std::str::FromStr;

use strum_macros::{AsRefStr, Display, EnumString};

/// Where rows live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DataBackend {
    Mysql,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: String,
    pub data_backend: DataBackend,
    pub database_url: Option<String>,
    pub api_prefix: String,

    // Rate limiting
    pub rate_per_min: u32,

    // Query cache
    pub query_stale_secs: u64,
    pub query_cache_capacity: u64,

    pub log_dir: String,
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum ConfigError {
    #[display(fmt = "{} must be set", _0)]
    Missing(&'static str),
}

impl std::error::Error for ConfigError {}

/// Reads `name` and parses it, falling back to `default` when the variable
/// is unset or unparsable.
fn parsed_or<T, F>(lookup: &F, name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            // Logging is not initialised yet; the log directory comes from here.
            eprintln!("Invalid {name}={raw:?}, using default {default}");
            default
        }),
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
        let server_addr = lookup("SERVER_ADDR").ok_or(ConfigError::Missing("SERVER_ADDR"))?;
        let data_backend = parsed_or(&lookup, "DATA_BACKEND", DataBackend::Mysql);
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if data_backend == DataBackend::Mysql && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        Ok(Self {
            server_addr,
            data_backend,
            database_url,
            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),
            rate_per_min: parsed_or(&lookup, "RATE_PER_MIN", 1000),
            query_stale_secs: parsed_or(&lookup, "QUERY_STALE_SECS", 30),
            query_cache_capacity: parsed_or(&lookup, "QUERY_CACHE_CAPACITY", 1024),
            log_dir: lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
        })
    }
}
