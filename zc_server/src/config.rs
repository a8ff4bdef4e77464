//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use std::net::SocketAddr;
use std::str::FromStr;
use zonecup::db::DatabaseConfig;
use zonecup::tournament::{TournamentConfig, TournamentFormat};

/// Default HTTP bind address
pub const DEFAULT_BIND: ([u8; 4], u16) = ([127, 0, 0, 1], 8080);

/// Where tournament state is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// PostgreSQL through sqlx
    Postgres,
    /// In-process store; state is lost on exit
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::Invalid {
                var: "STORE_BACKEND".to_string(),
                reason: format!("expected 'postgres' or 'memory', got '{other}'"),
            }),
        }
    }
}

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Storage backend
    pub store: StoreBackend,
    /// Database configuration, used by the Postgres backend
    pub database: DatabaseConfig,
    /// Club defaults applied to tournaments created without a configuration
    pub tournament_defaults: TournamentConfig,
    /// Prometheus scrape address; metrics are disabled when unset
    pub metrics_bind: Option<SocketAddr>,
}

/// Values taken from the command line, overriding the environment
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub bind: Option<SocketAddr>,
    pub database_url: Option<String>,
    pub memory: bool,
    pub metrics_bind: Option<SocketAddr>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `overrides` - Values from CLI args, taking precedence over the environment
    ///
    /// # Errors
    ///
    /// Returns error if a variable is present but invalid
    pub fn from_env(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let bind = match overrides.bind {
            Some(bind) => bind,
            None => parse_env_opt("SERVER_BIND")?.unwrap_or_else(|| SocketAddr::from(DEFAULT_BIND)),
        };

        let store = if overrides.memory {
            StoreBackend::Memory
        } else {
            parse_env_opt("STORE_BACKEND")?.unwrap_or(StoreBackend::Postgres)
        };

        let database = match overrides.database_url {
            Some(url) => DatabaseConfig::from_env().with_url(url),
            None => DatabaseConfig::from_env(),
        };

        let metrics_bind = match overrides.metrics_bind {
            Some(addr) => Some(addr),
            None => parse_env_opt("METRICS_BIND")?,
        };

        Ok(ServerConfig {
            bind,
            store,
            database,
            tournament_defaults: TournamentConfig::from_env(),
            metrics_bind,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store == StoreBackend::Postgres {
            if self.database.max_connections == 0 {
                return Err(ConfigError::Invalid {
                    var: "DB_MAX_CONNECTIONS".to_string(),
                    reason: "Must be greater than 0".to_string(),
                });
            }

            if self.database.min_connections > self.database.max_connections {
                return Err(ConfigError::Invalid {
                    var: "DB_MIN_CONNECTIONS".to_string(),
                    reason: format!(
                        "Must not exceed max connections ({})",
                        self.database.max_connections
                    ),
                });
            }
        }

        if self.metrics_bind == Some(self.bind) {
            return Err(ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("Must differ from the server address ({})", self.bind),
            });
        }

        self.tournament_defaults
            .validate(TournamentFormat::ZoneThenBracket)
            .map_err(|e| ConfigError::Invalid {
                var: "DEFAULT_*".to_string(),
                reason: e.to_string(),
            })
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Parse an optional environment variable, rejecting malformed values
fn parse_env_opt<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse::<T>().map(Some).map_err(|e| ConfigError::Invalid {
            var: key.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServerConfig {
        ServerConfig {
            bind: SocketAddr::from(DEFAULT_BIND),
            store: StoreBackend::Postgres,
            database: DatabaseConfig::development(),
            tournament_defaults: TournamentConfig::default(),
            metrics_bind: None,
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid {
            var: "STORE_BACKEND".to_string(),
            reason: "expected 'postgres' or 'memory'".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("STORE_BACKEND"));
        assert!(msg.contains("memory"));
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("Postgres".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_pool_bounds() {
        let mut config = config();
        config.database.min_connections = 50;
        config.database.max_connections = 10;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "DB_MIN_CONNECTIONS"));

        // Pool settings do not matter for the memory backend
        config.store = StoreBackend::Memory;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_metrics_port_clash() {
        let mut config = config();
        config.metrics_bind = Some(config.bind);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_tournament_defaults() {
        let mut config = config();
        config.tournament_defaults.zone_size = 1;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("zone_size"));
    }
}
