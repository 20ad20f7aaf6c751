use orderbot::config::{DialogSettings, log_level};
use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
    #[error(transparent)]
    Dialog(#[from] orderbot::config::ConfigError),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub dialog: DialogSettings,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// This function will look for a `.env` file in the current directory
    /// and load the following variables:
    ///
    /// *   `BIND_ADDRESS`: The address and port to bind the server to (e.g., "0.0.0.0:3000").
    /// *   `CATALOG_URL`, `CATALOG_FILE`, `CATALOG_TIMEOUT_MS`, `DEFAULT_RESTAURANT_ID`,
    ///     `FARE_MIN`, `FARE_MAX`: see [`DialogSettings`].
    /// *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let lookup = |name: &str| std::env::var(name).ok();

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        Ok(Self {
            bind_address,
            dialog: DialogSettings::from_lookup(&lookup)?,
            log_level: log_level(&lookup)?,
        })
    }
}
