use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::WarpError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub throttle: ThrottleConfig,
    pub storage: StorageConfig,
    pub models: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub log_filter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub api_key: String,
    pub master_key: String,
    pub password_cost: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    pub limit: u32,
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub path: PathBuf,
    pub base_url: Option<String>,
}

impl Environment {
    fn from_name(name: Option<&str>) -> Self {
        match name {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, WarpError> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Build from any key lookup: presets for the selected environment first,
    /// then individual overrides. Required keys fail with `MissingConfiguration`.
    pub fn from_source<F>(lookup: F) -> Result<Self, WarpError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = Environment::from_name(lookup("APP_ENV").as_deref());
        let mut config = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        };

        config.database.url = required(&lookup, "DATABASE_URL", "DB configuration")?;
        config.security.api_key = required(&lookup, "WARP_API_KEY", "API Key")?;
        config.security.master_key = required(&lookup, "WARP_MASTER_KEY", "Master Key")?;

        Ok(config.with_overrides(&lookup))
    }

    fn with_overrides<F>(mut self, lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(v) = lookup("WARP_PORT").or_else(|| lookup("PORT")) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Some(v) = lookup("WARP_LOG") {
            self.server.log_filter = v;
        }

        // Database overrides
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Some(v) = lookup("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Throttle overrides
        if let Some(v) = lookup("WARP_THROTTLE_LIMIT") {
            self.throttle.limit = v.parse().unwrap_or(self.throttle.limit);
        }
        if let Some(v) = lookup("WARP_THROTTLE_INTERVAL_SECS") {
            self.throttle.interval_secs = v.parse().unwrap_or(self.throttle.interval_secs);
        }

        // Security overrides
        if let Some(v) = lookup("WARP_PASSWORD_COST") {
            self.security.password_cost = v.parse().unwrap_or(self.security.password_cost);
        }

        // Storage overrides
        if let Some(v) = lookup("WARP_STORAGE_PATH") {
            self.storage.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("WARP_STORAGE_URL") {
            self.storage.base_url = Some(v);
        }

        if let Some(v) = lookup("WARP_MODELS") {
            self.models = Some(PathBuf::from(v));
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                log_filter: "warp_api_rust=debug,tower_http=debug".to_string(),
            },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 10,
                connection_timeout: 30,
            },
            security: SecurityConfig {
                api_key: String::new(),
                master_key: String::new(),
                password_cost: bcrypt::DEFAULT_COST,
            },
            throttle: ThrottleConfig {
                limit: 20,
                interval_secs: 60,
            },
            storage: StorageConfig {
                path: PathBuf::from("./storage"),
                base_url: None,
            },
            models: None,
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 3000,
                log_filter: "warp_api_rust=info,tower_http=info".to_string(),
            },
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
                ..Self::development().database
            },
            ..Self::development()
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 3000,
                log_filter: "warp_api_rust=info,tower_http=warn".to_string(),
            },
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
                ..Self::development().database
            },
            ..Self::development()
        }
    }
}

fn required<F>(lookup: &F, key: &str, label: &str) -> Result<String, WarpError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(WarpError::MissingConfiguration(label.to_string())),
    }
}
