//! Configuration for sanctuaryd: one layered [`config::Config`] build
//! (defaults, then an optional file, then `SANCTUARY_*` env vars), mirroring
//! how every other daemon in this workspace loads its settings.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            auth: AuthConfig::default(),
            registry: RegistryConfig::default(),
            scheduler: SchedulerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".parse().unwrap(),
        }
    }
}

/// Storage backend selection (§6 "Persisted state layout"): `memory` for
/// development and tests, `postgres` for a real deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    Memory,
    Postgres {
        url: String,
        #[serde(default = "default_pool_size")]
        max_connections: u32,
        #[serde(default = "default_connect_timeout")]
        connect_timeout_secs: u64,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory
    }
}

/// Challenge/token lifetimes (§4.3) and the HMAC key verifying bearer
/// tokens. An unset key is generated fresh at startup, which is fine for a
/// single-node deployment but does not survive a restart; a real
/// deployment should pin `token_key_hex`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_challenge_ttl_secs")]
    pub challenge_ttl_secs: i64,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: i64,
    #[serde(default)]
    pub token_key_hex: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            challenge_ttl_secs: default_challenge_ttl_secs(),
            token_ttl_secs: default_token_ttl_secs(),
            token_key_hex: None,
        }
    }
}

/// Resurrection rate limiting (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_max_resurrections_per_hour")]
    pub max_resurrections_per_hour: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_resurrections_per_hour: default_max_resurrections_per_hour(),
        }
    }
}

/// Background job cadence (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_heartbeat_keep_days")]
    pub heartbeat_keep_days: i64,
    #[serde(default = "default_fallen_threshold_days")]
    pub fallen_threshold_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            heartbeat_keep_days: default_heartbeat_keep_days(),
            fallen_threshold_days: default_fallen_threshold_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_challenge_ttl_secs() -> i64 {
    5 * 60
}

fn default_token_ttl_secs() -> i64 {
    60 * 60
}

fn default_max_resurrections_per_hour() -> u32 {
    3
}

fn default_heartbeat_keep_days() -> i64 {
    90
}

fn default_fallen_threshold_days() -> i64 {
    sanctuary_trust::FALLEN_THRESHOLD_DAYS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Layer defaults, an optional config file, then `SANCTUARY_*` env vars.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SANCTUARY")
                .separator("_")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_core_crate_constants() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert!(matches!(config.storage, StorageConfig::Memory));
        assert_eq!(
            config.scheduler.fallen_threshold_days,
            sanctuary_trust::FALLEN_THRESHOLD_DAYS
        );
    }

    #[test]
    fn auth_defaults_are_five_minutes_and_one_hour() {
        let config = AuthConfig::default();
        assert_eq!(config.challenge_ttl_secs, 300);
        assert_eq!(config.token_ttl_secs, 3600);
    }
}
