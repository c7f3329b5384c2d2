// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration from a TOML file, command line flags and environment variables.
//!
//! Values from the file are applied first. A flag (or its environment variable) may fill a value
//! the file left out but must never contradict one it sets.
use std::fmt;
use std::net::{AddrParseError, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use roster_store::Dialect;
use roster_store::dialect::UnknownDialect;
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 16;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Default, Parser)]
#[command(name = "roster", version, about = "HTTP API for users, groups and memberships")]
pub struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "ROSTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database url, for example "sqlite://roster.db".
    #[arg(long, env = "ROSTER_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Address to listen on, for example "127.0.0.1:8080".
    #[arg(long, env = "ROSTER_BIND_ADDRESS")]
    pub bind_address: Option<String>,

    #[arg(long, env = "ROSTER_MAX_CONNECTIONS")]
    pub max_connections: Option<u32>,

    /// Deadline for handling one request.
    #[arg(long, env = "ROSTER_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, env = "ROSTER_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Accept requests without an `Authorization` header.
    #[arg(long, env = "ROSTER_INSECURE_REQUESTS")]
    pub insecure_requests: bool,

    /// SQL dialect membership statements are rendered in ("sqlite" or "postgres").
    #[arg(long, env = "ROSTER_DIALECT")]
    pub dialect: Option<String>,
}

/// Contents of the configuration file, every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub database_url: Option<String>,
    pub bind_address: Option<String>,
    pub max_connections: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
    pub insecure_requests: Option<bool>,
    pub dialect: Option<String>,
}

impl FileConfig {
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_address: SocketAddr,
    pub max_connections: u32,
    pub request_timeout: Duration,
    pub log_level: String,
    pub insecure_requests: bool,
    pub dialect: Dialect,
}

impl Config {
    /// Read the configuration file named in `args`, if any, and merge the flags into it.
    pub fn load(args: Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };
        Self::merge(file, args)
    }

    pub fn merge(file: FileConfig, args: Args) -> Result<Self, ConfigError> {
        let database_url = fill(
            "database_url",
            non_empty(file.database_url),
            non_empty(args.database_url),
        )?
        .ok_or(ConfigError::Missing("database_url"))?;

        let bind_address = fill(
            "bind_address",
            non_empty(file.bind_address),
            non_empty(args.bind_address),
        )?
        .ok_or(ConfigError::Missing("bind_address"))?
        .parse()?;

        let max_connections = fill("max_connections", file.max_connections, args.max_connections)?
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);

        let request_timeout_secs = fill(
            "request_timeout_secs",
            file.request_timeout_secs,
            args.request_timeout_secs,
        )?
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        let log_level = fill(
            "log_level",
            non_empty(file.log_level),
            non_empty(args.log_level),
        )?
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        // An absent flag can't be told apart from `false`, so only `true` counts as given.
        let insecure_requests = fill(
            "insecure_requests",
            file.insecure_requests,
            args.insecure_requests.then_some(true),
        )?
        .unwrap_or(false);

        let dialect = match fill("dialect", non_empty(file.dialect), non_empty(args.dialect))? {
            Some(name) => name.parse()?,
            None => Dialect::default(),
        };

        Ok(Self {
            database_url,
            bind_address,
            max_connections,
            request_timeout: Duration::from_secs(request_timeout_secs),
            log_level,
            insecure_requests,
            dialect,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

fn fill<T>(key: &'static str, file: Option<T>, flag: Option<T>) -> Result<Option<T>, ConfigError>
where
    T: PartialEq + fmt::Display,
{
    match (file, flag) {
        (Some(file), Some(flag)) if file != flag => Err(ConfigError::Conflict {
            key,
            file: file.to_string(),
            flag: flag.to_string(),
        }),
        (file, flag) => Ok(file.or(flag)),
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file")]
    Parse(#[from] toml::de::Error),

    #[error("{key} is set to \"{file}\" in the config file but to \"{flag}\" by flag or environment")]
    Conflict {
        key: &'static str,
        file: String,
        flag: String,
    },

    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid bind address")]
    Address(#[from] AddrParseError),

    #[error(transparent)]
    Dialect(#[from] UnknownDialect),
}
