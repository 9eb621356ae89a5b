use super::types::Config;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Home directory not found")]
    HomeDirNotFound,
    #[error("Config I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// `~/.monero-connection-manager/config.toml`
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
    Ok(home.join(".monero-connection-manager").join("config.toml"))
}

impl Config {
    /// Load from the default path, falling back to defaults when the file is absent
    pub fn load() -> Result<Self, ConfigError> {
        let path = default_config_path()?;
        if !path.exists() {
            return Ok(Config::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Write the default config to the default path if none exists
    pub fn init() -> Result<PathBuf, ConfigError> {
        let path = default_config_path()?;
        Self::init_at(&path)?;
        Ok(path)
    }

    /// Returns false when a file already existed and was left untouched
    pub fn init_at(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        Config::default().save_to(path)?;
        Ok(true)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        std::fs::write(path, self.to_toml()?).map_err(io_error)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeout_ms must be greater than 0".to_string()));
        }
        if self.polling.period_ms == 0 {
            return Err(ConfigError::Invalid(
                "polling.period_ms must be greater than 0".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for entry in &self.connections {
            if entry.uri.trim().is_empty() {
                return Err(ConfigError::Invalid("connection uri must not be empty".to_string()));
            }
            if !seen.insert(entry.uri.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate connection uri: {}",
                    entry.uri
                )));
            }
            if entry.username.is_some() != entry.password.is_some() {
                return Err(ConfigError::Invalid(format!(
                    "connection {} must set both username and password",
                    entry.uri
                )));
            }
            if entry.timeout_ms == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "connection {} timeout_ms must be greater than 0",
                    entry.uri
                )));
            }
        }
        Ok(())
    }
}
