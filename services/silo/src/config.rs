use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::db::DbConfig;

/// Where journals and snapshots live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process memory; lost on restart.
    Memory,
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "postgres" | "pg" => Ok(Self::Postgres),
            other => bail!("unknown storage backend \"{other}\" (expected memory or postgres)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    pub dev_mode: bool,
    pub storage: StorageBackend,
    pub idle_timeout: Duration,
    pub passivation_interval: Duration,
    pub database: DbConfig,
}

fn secs(name: &str, default: u64) -> Result<Duration> {
    match std::env::var(name) {
        Ok(v) => Ok(Duration::from_secs(v.trim().parse()?)),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let listen_addr = std::env::var("SILO_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()?;

        let log_level = std::env::var("SILO_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let dev_mode = std::env::var("SILO_DEV")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let storage = std::env::var("SILO_STORAGE")
            .unwrap_or_else(|_| "memory".to_string())
            .parse()?;

        let idle_timeout = secs("SILO_IDLE_TIMEOUT_SECS", 300)?;
        let passivation_interval = secs("SILO_PASSIVATION_INTERVAL_SECS", 30)?;
        if passivation_interval.is_zero() {
            bail!("SILO_PASSIVATION_INTERVAL_SECS must be greater than zero");
        }

        let database = DbConfig::from_env();

        Ok(Self {
            listen_addr,
            log_level,
            dev_mode,
            storage,
            idle_timeout,
            passivation_interval,
            database,
        })
    }
}
