//! Process settings read from the environment (after `dotenvy::dotenv()` in the binary).

use crate::error::ConfigError;
use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Which record store backs the API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreSettings {
    Postgres { database_url: String, max_connections: u32 },
    /// In-process store; data is lost on restart.
    Memory,
}

/// Where authorization decisions come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicySettings {
    /// External policy service at this base URL.
    Remote { url: String },
    /// Static role grants; `None` uses the built-in `catalog/policies.json`.
    Roles { path: Option<PathBuf> },
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub bind_addr: String,
    pub store: StoreSettings,
    pub policy: PolicySettings,
    pub catalog_path: Option<PathBuf>,
    pub body_limit_bytes: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::Validation(format!("DB_MAX_CONNECTIONS: not a number: {}", v)))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        let store = match get("DATABASE_URL") {
            Some(database_url) => StoreSettings::Postgres {
                database_url,
                max_connections,
            },
            None => StoreSettings::Memory,
        };

        let policy = match (get("POLICY_URL"), get("POLICY_PATH")) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Validation(
                    "POLICY_URL and POLICY_PATH are mutually exclusive".into(),
                ))
            }
            (Some(url), None) => PolicySettings::Remote {
                url: url.trim_end_matches('/').to_string(),
            },
            (None, path) => PolicySettings::Roles {
                path: path.map(PathBuf::from),
            },
        };

        let body_limit_bytes = match get("BODY_LIMIT_BYTES") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::Validation(format!("BODY_LIMIT_BYTES: not a number: {}", v)))?,
            None => DEFAULT_BODY_LIMIT_BYTES,
        };

        Ok(Settings {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            store,
            policy,
            catalog_path: get("CATALOG_PATH").map(PathBuf::from),
            body_limit_bytes,
        })
    }
}
