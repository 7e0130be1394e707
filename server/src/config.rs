//! Command line configuration and fixed store transport policy

use clap::{Parser, ValueEnum};
use shared::DEFAULT_CHUNK_SIZE;
use std::path::PathBuf;
use std::time::Duration;

/// How roster membership is laid out in the durable store
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum RosterMode {
    /// One record holding the whole roster, overwritten on every change.
    /// Concurrent joins and leaves can overwrite each other (last write wins).
    Record,
    /// One row per connection; membership changes never touch other rows
    #[default]
    PerConnection,
}

/// Server configuration parsed from the command line
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    pub port: u16,

    /// Directory for durable block and roster storage (in-memory when omitted)
    #[clap(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Maximum number of blocks per onboarding message
    #[clap(short, long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Roster storage layout
    #[clap(short, long, value_enum, default_value_t = RosterMode::PerConnection)]
    pub roster_mode: RosterMode,

    /// Do not carry the block list between events
    #[clap(long)]
    pub cold_start: bool,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn invocation_settings(&self) -> InvocationSettings {
        InvocationSettings {
            chunk_size: self.chunk_size.max(1),
            roster_mode: self.roster_mode,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            roster_mode: RosterMode::default(),
            cold_start: false,
        }
    }
}

/// Per-invocation knobs handed to the router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvocationSettings {
    pub chunk_size: usize,
    pub roster_mode: RosterMode,
}

impl Default for InvocationSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            roster_mode: RosterMode::default(),
        }
    }
}

/// Retry and timeout policy of the store's underlying I/O.
///
/// Global and fixed; the store adapter surfaces only the terminal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorePolicy {
    pub max_retries: u32,
    pub operation_timeout: Duration,
    pub connect_timeout: Duration,
    pub retry_backoff: Duration,
}

impl StorePolicy {
    pub const fn fixed() -> Self {
        Self {
            max_retries: 5,
            operation_timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(30),
            retry_backoff: Duration::from_millis(50),
        }
    }
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self::fixed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::parse_from(["server"]);
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.roster_mode, RosterMode::PerConnection);
        assert!(config.data_dir.is_none());
        assert!(!config.cold_start);
    }

    #[test]
    fn test_parse_flags() {
        let config = ServerConfig::parse_from([
            "server",
            "-H",
            "0.0.0.0",
            "--port",
            "9000",
            "--roster-mode",
            "record",
            "--chunk-size",
            "0",
            "--data-dir",
            "/tmp/world",
            "--cold-start",
        ]);

        assert_eq!(config.address(), "0.0.0.0:9000");
        assert_eq!(config.roster_mode, RosterMode::Record);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/world")));
        assert!(config.cold_start);
        // A zero chunk size would never make progress
        assert_eq!(config.invocation_settings().chunk_size, 1);
    }

    #[test]
    fn test_store_policy_is_fixed() {
        let policy = StorePolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.operation_timeout, Duration::from_secs(15));
        assert_eq!(policy.connect_timeout, Duration::from_secs(30));
    }
}
