//! Application configuration
//!
//! Loaded from a TOML file. Every section and field has a default, so a
//! partial file (or none at all) yields a runnable configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::application::{CoreSettings, SpaceTypeRegistry};
use crate::domain::SpaceType;
use crate::infrastructure::crypto::JwtConfig;
use crate::infrastructure::database::DatabaseConfig;
use crate::shared::utils::RetryConfig;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "PARKEOYA_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// `$PARKEOYA_CONFIG`, else `<config dir>/parkeoya/config.toml`.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("parkeoya")
        .join("config.toml")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub database: DatabaseSection,
    pub logging: LoggingSection,
    pub security: SecuritySection,
    pub reservations: ReservationSection,
    pub allocation: AllocationSection,
    pub retry: RetrySection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSection {
    pub api_host: String,
    pub api_port: u16,
    /// Seconds to wait for in-flight work on shutdown
    pub shutdown_timeout: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 8080,
            shutdown_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Sqlite,
    Postgres,
    /// DashMap repositories; nothing survives a restart
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseSection {
    pub backend: DatabaseBackend,
    pub sqlite: SqliteSection,
    pub postgres: PostgresSection,
    pub pool: PoolSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SqliteSection {
    pub path: String,
}

impl Default for SqliteSection {
    fn default() -> Self {
        Self {
            path: "./parkeoya.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PostgresSection {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for PostgresSection {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "parkeoya".to_string(),
            password: String::new(),
            database: "parkeoya".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PoolSection {
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connect_timeout_secs: 8,
        }
    }
}

impl DatabaseSection {
    /// Connection URL for the SQL backends. `None` for `memory`.
    pub fn connection_url(&self) -> Option<String> {
        match self.backend {
            DatabaseBackend::Sqlite => Some(format!("sqlite://{}?mode=rwc", self.sqlite.path)),
            DatabaseBackend::Postgres => {
                let pg = &self.postgres;
                let credentials = if pg.password.is_empty() {
                    pg.user.clone()
                } else {
                    format!("{}:{}", pg.user, pg.password)
                };
                Some(format!(
                    "postgres://{}@{}:{}/{}",
                    credentials, pg.host, pg.port, pg.database
                ))
            }
            DatabaseBackend::Memory => None,
        }
    }

    pub fn to_database_config(&self, run_migrations: bool) -> Option<DatabaseConfig> {
        self.connection_url().map(|url| DatabaseConfig {
            url,
            max_connections: self.pool.max_connections,
            connect_timeout: Duration::from_secs(self.pool.connect_timeout_secs),
            run_migrations,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSection {
    /// `EnvFilter` directive, e.g. `info` or `parkeoya=debug,tower_http=info`
    pub level: String,
    /// `text` or `json`
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SecuritySection {
    pub jwt_secret: String,
    pub jwt_issuer: String,
}

impl Default for SecuritySection {
    fn default() -> Self {
        let jwt = JwtConfig::default();
        Self {
            jwt_secret: jwt.secret,
            jwt_issuer: jwt.issuer,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReservationSection {
    /// Longest wait for a space or lot before answering `Busy`
    pub lock_timeout_ms: u64,
    pub expiry_check_interval_secs: u64,
}

impl Default for ReservationSection {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 2000,
            expiry_check_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AllocationSection {
    pub max_capacity: u32,
    /// Percent per space type; must add up to 100
    pub default_ratios: BTreeMap<String, u32>,
}

impl Default for AllocationSection {
    fn default() -> Self {
        let registry = SpaceTypeRegistry::default();
        Self {
            max_capacity: 10_000,
            default_ratios: SpaceType::ALL
                .iter()
                .map(|t| (t.as_str().to_string(), registry.ratio(*t)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        let retry = RetryConfig::default();
        Self {
            max_attempts: retry.max_attempts,
            initial_delay_ms: retry.initial_delay.as_millis() as u64,
            max_delay_ms: retry.max_delay.as_millis() as u64,
        }
    }
}

impl AppConfig {
    /// Read `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self)?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(write_err)?;
            }
        }
        std::fs::write(path, text).map_err(write_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.api_port == 0 {
            return Err(ConfigError::Invalid("server.api_port must not be 0".into()));
        }
        if !matches!(self.logging.format.to_lowercase().as_str(), "text" | "json") {
            return Err(ConfigError::Invalid(format!(
                "logging.format must be text or json, got {}",
                self.logging.format
            )));
        }
        if self.security.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid("security.jwt_secret is empty".into()));
        }
        if self.reservations.lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "reservations.lock_timeout_ms must be positive".into(),
            ));
        }
        if self.allocation.max_capacity == 0 {
            return Err(ConfigError::Invalid(
                "allocation.max_capacity must be positive".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        self.space_type_registry()?;
        Ok(())
    }

    pub fn space_type_registry(&self) -> Result<SpaceTypeRegistry, ConfigError> {
        let mut ratios = BTreeMap::new();
        for (name, percent) in &self.allocation.default_ratios {
            let space_type = SpaceType::parse(name).ok_or_else(|| {
                ConfigError::Invalid(format!("allocation.default_ratios: unknown space type {name}"))
            })?;
            let slot = ratios.entry(space_type).or_insert(0u32);
            *slot = slot.saturating_add(*percent);
        }
        SpaceTypeRegistry::with_ratios(ratios).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry.max_attempts,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            ..RetryConfig::default()
        }
    }

    pub fn core_settings(&self) -> CoreSettings {
        CoreSettings {
            lock_timeout: Duration::from_millis(self.reservations.lock_timeout_ms),
            max_capacity: self.allocation.max_capacity,
            retry: self.retry_config(),
        }
    }

    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig::new(
            self.security.jwt_secret.clone(),
            self.security.jwt_issuer.clone(),
        )
    }
}
