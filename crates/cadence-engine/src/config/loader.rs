use super::schema::CadenceConfig;
use crate::strategy::{ProfileError, StrategyTable};
use chrono::format::{Item, StrftimeItems};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const USERNAME_VAR: &str = "CADENCE_USERNAME";
pub const PASSWORD_VAR: &str = "CADENCE_PASSWORD";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid tenant profile {path}: {source}")]
    Profile {
        path: PathBuf,
        #[source]
        source: ProfileError,
    },
    #[error("Missing credential: set {0}")]
    MissingCredential(&'static str),
    #[error("Invalid date format '{0}'")]
    InvalidDateFormat(String),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./cadence.yaml
    /// 2. ~/.cadence/config.yaml
    /// 3. Default configuration
    pub async fn load_default() -> Result<CadenceConfig, ConfigError> {
        let local_config = PathBuf::from("./cadence.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".cadence").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        Ok(CadenceConfig::default())
    }

    pub async fn load_from(path: &Path) -> Result<CadenceConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: CadenceConfig = serde_yaml::from_str(&content)?;
        validate_date_format(&config.portal.date_format)?;
        Ok(config)
    }

    /// Strategy table for the configured tenant, or the built-in one.
    pub async fn load_profile(path: Option<&Path>) -> Result<StrategyTable, ConfigError> {
        let Some(path) = path else {
            return Ok(StrategyTable::default());
        };
        let content = tokio::fs::read_to_string(path).await?;
        StrategyTable::from_yaml(&content).map_err(|source| ConfigError::Profile {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Portal account. The password never appears in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read credentials from the environment after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingCredential(key))
        };
        Ok(Self {
            username: get(USERNAME_VAR)?,
            password: get(PASSWORD_VAR)?,
        })
    }
}

pub fn validate_date_format(format: &str) -> Result<(), ConfigError> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::InvalidDateFormat(format.to_string()));
    }
    Ok(())
}

/// Today's local date in `format`.
pub fn today(format: &str) -> Result<String, ConfigError> {
    validate_date_format(format)?;
    Ok(chrono::Local::now().format(format).to_string())
}
