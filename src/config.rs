//! Hub configuration parsed from environment variables.

use std::net::{IpAddr, Ipv4Addr};

use crate::state::DEFAULT_CLIENT_QUEUE_DEPTH;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is required")]
    Missing { var: &'static str },
    #[error("invalid {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Which `ElementStore` adapter to run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Postgres { database_url: String, max_connections: u32 },
    /// In-process store seeded with a fixed board catalog.
    Memory { boards: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub storage: StorageConfig,
    pub client_queue_depth: usize,
}

impl HubConfig {
    /// Build typed hub config from environment variables.
    ///
    /// Optional:
    /// - `BIND_ADDR`: default `0.0.0.0`
    /// - `PORT`: default 3000
    /// - `STORAGE`: `postgres` (default) or `memory`
    /// - `DATABASE_URL`: required when `STORAGE=postgres`
    /// - `DB_MAX_CONNECTIONS`: default 5
    /// - `MEMORY_BOARDS`: comma-separated boards for `STORAGE=memory`
    /// - `CLIENT_QUEUE_DEPTH`: default 256
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does
    /// not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// See `from_env`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = parse_or("BIND_ADDR", &lookup, IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
        let port = parse_or("PORT", &lookup, DEFAULT_PORT)?;
        let client_queue_depth = parse_or("CLIENT_QUEUE_DEPTH", &lookup, DEFAULT_CLIENT_QUEUE_DEPTH)?;
        if client_queue_depth == 0 {
            return Err(ConfigError::Invalid { var: "CLIENT_QUEUE_DEPTH", value: "0".into() });
        }

        let storage = match lookup("STORAGE").as_deref().unwrap_or("postgres") {
            "postgres" => StorageConfig::Postgres {
                database_url: lookup("DATABASE_URL").ok_or(ConfigError::Missing { var: "DATABASE_URL" })?,
                max_connections: parse_or("DB_MAX_CONNECTIONS", &lookup, DEFAULT_DB_MAX_CONNECTIONS)?,
            },
            "memory" => StorageConfig::Memory { boards: split_boards(lookup("MEMORY_BOARDS").as_deref()) },
            other => return Err(ConfigError::Invalid { var: "STORAGE", value: other.to_string() }),
        };

        Ok(Self { bind_addr, port, storage, client_queue_depth })
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &'static str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}

fn split_boards(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|board| !board.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
