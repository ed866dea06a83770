//! Runtime configuration for hosts embedding the CRM core.
//!
//! Values come from environment variables:
//!
//! - `CRM_DB_PATH`: SQLite database file (default: `crm.sqlite3`)
//! - `CRM_LOG_LEVEL`: `trace|debug|info|warn|error` (default: build-mode dependent)
//! - `CRM_LOG_DIR`: absolute log directory; file logging stays off when unset
//! - `CRM_ACCOUNTS_PER_PAGE`: account listing page size, 1..=200 (default: 20)

use crate::logging::default_log_level;
use crate::model::account::PER_PAGE;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

const DEFAULT_DB_PATH: &str = "crm.sqlite3";
const MAX_PER_PAGE: u32 = 200;

/// Complete core configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub accounts: AccountsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `None` disables file logging.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountsConfig {
    pub per_page: u32,
}

/// Configuration value rejected during loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid value `{value}` for {key}: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: PathBuf::from(DEFAULT_DB_PATH),
            },
            logging: LoggingConfig {
                level: default_log_level().to_string(),
                dir: None,
            },
            accounts: AccountsConfig { per_page: PER_PAGE },
        }
    }
}

impl CrmConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(path) = get("CRM_DB_PATH") {
            config.database.path = PathBuf::from(path);
        }

        if let Some(level) = get("CRM_LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Some(dir) = get("CRM_LOG_DIR") {
            let dir = PathBuf::from(dir);
            if !dir.is_absolute() {
                return Err(ConfigError::InvalidValue {
                    key: "CRM_LOG_DIR",
                    value: dir.display().to_string(),
                    reason: "must be an absolute path",
                });
            }
            config.logging.dir = Some(dir);
        }

        if let Some(raw) = get("CRM_ACCOUNTS_PER_PAGE") {
            config.accounts.per_page = raw
                .parse::<u32>()
                .ok()
                .filter(|n| (1..=MAX_PER_PAGE).contains(n))
                .ok_or(ConfigError::InvalidValue {
                    key: "CRM_ACCOUNTS_PER_PAGE",
                    value: raw,
                    reason: "must be an integer between 1 and 200",
                })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CrmConfig};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn load(vars: &[(&str, &str)]) -> Result<CrmConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CrmConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config, CrmConfig::default());
        assert_eq!(config.accounts.per_page, 20);
        assert_eq!(config.database.path, PathBuf::from("crm.sqlite3"));
        assert!(config.logging.dir.is_none());
    }

    #[test]
    fn overrides_are_trimmed_and_applied() {
        let config = load(&[
            ("CRM_DB_PATH", " /srv/crm/data.sqlite3 "),
            ("CRM_LOG_LEVEL", "warn"),
            ("CRM_LOG_DIR", "/var/log/crm"),
            ("CRM_ACCOUNTS_PER_PAGE", "50"),
        ])
        .unwrap();
        assert_eq!(config.database.path, PathBuf::from("/srv/crm/data.sqlite3"));
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.dir, Some(PathBuf::from("/var/log/crm")));
        assert_eq!(config.accounts.per_page, 50);
    }

    #[test]
    fn rejects_out_of_range_page_size_and_relative_log_dir() {
        let err = load(&[("CRM_ACCOUNTS_PER_PAGE", "0")]).unwrap_err();
        assert!(err.to_string().contains("CRM_ACCOUNTS_PER_PAGE"));
        assert!(load(&[("CRM_ACCOUNTS_PER_PAGE", "lots")]).is_err());

        let err = load(&[("CRM_LOG_DIR", "logs")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "CRM_LOG_DIR",
                ..
            }
        ));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = load(&[("CRM_LOG_DIR", "  "), ("CRM_DB_PATH", "")]).unwrap();
        assert_eq!(config, CrmConfig::default());
    }
}
