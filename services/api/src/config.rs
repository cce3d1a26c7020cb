use std::net::SocketAddr;

use anyhow::{anyhow, Result};
use tutorhub_store::{DbConfig, FallbackPolicy};

/// Which backend holds counters and documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Process-local, lost on restart.
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow!(
                "unknown store backend '{other}' (expected 'postgres' or 'memory')"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    pub dev_mode: bool,
    pub store: StoreBackend,
    pub sequence_fallback: FallbackPolicy,
    pub database: DbConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let listen_addr = std::env::var("TUTORHUB_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:5000".to_string())
            .parse()?;

        let log_level = std::env::var("TUTORHUB_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let dev_mode = std::env::var("TUTORHUB_DEV")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let store = std::env::var("TUTORHUB_STORE")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse::<StoreBackend>()?;

        let sequence_fallback = match std::env::var("TUTORHUB_SEQUENCE_FALLBACK") {
            Ok(v) => v.parse::<FallbackPolicy>().map_err(|e| anyhow!(e))?,
            Err(_) => FallbackPolicy::default(),
        };

        let database = DbConfig::from_env();

        Ok(Self {
            listen_addr,
            log_level,
            dev_mode,
            store,
            sequence_fallback,
            database,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("Postgres".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert!("mongo".parse::<StoreBackend>().is_err());
    }
}
