use std::{env, fmt::Display, str::FromStr};

use thiserror::Error;
use tracing::info;

use crate::services::leaderboard::{LeaderboardOptions, WriteMode, DEFAULT_CAPACITY, LEADERBOARD_KEY};

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(format!("unknown store backend `{other}` (expected memory or sqlite)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub backend: StoreBackend,
    pub database_path: String,
    pub leaderboard_key: String,
    pub capacity: usize,
    pub write_mode: WriteMode,
    pub require_name: bool,
    pub strict_reads: bool,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let capacity: usize = try_load(&lookup, "LEADERBOARD_CAPACITY", &DEFAULT_CAPACITY.to_string())?;
        if capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "LEADERBOARD_CAPACITY",
                value: capacity.to_string(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(Self {
            host: try_load(&lookup, "HOST", "0.0.0.0")?,
            port: try_load(&lookup, "PORT", "3001")?,
            backend: try_load(&lookup, "LEADERBOARD_STORE", "sqlite")?,
            database_path: try_load(&lookup, "DATABASE_PATH", "captcha-race.db")?,
            leaderboard_key: try_load(&lookup, "LEADERBOARD_KEY", LEADERBOARD_KEY)?,
            capacity,
            write_mode: try_load(&lookup, "LEADERBOARD_WRITE_MODE", "last-write-wins")?,
            require_name: try_load(&lookup, "LEADERBOARD_REQUIRE_NAME", "false")?,
            strict_reads: try_load(&lookup, "LEADERBOARD_STRICT_READS", "false")?,
        })
    }

    pub fn leaderboard_options(&self) -> LeaderboardOptions {
        LeaderboardOptions {
            key: self.leaderboard_key.clone(),
            capacity: self.capacity,
            write_mode: self.write_mode,
            require_name: self.require_name,
            strict_reads: self.strict_reads,
        }
    }
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.clone(),
        reason: e.to_string(),
    })
}
