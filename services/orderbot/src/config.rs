//! Application Configuration Module
//!
//! Loads the orderbot settings from environment variables (and a `.env` file
//! when present) into structs that are passed to the catalog loader, the
//! capture driver and the logger.

use order_core::capture::CaptureConfig;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_CATALOG_FILE: &str = "fixtures/catalog.json";

/// Where restaurants and menus come from.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogSource {
    Remote(String),
    File(PathBuf),
}

/// Settings needed to build a dialog manager. Shared with the HTTP API.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogSettings {
    pub catalog: CatalogSource,
    pub catalog_timeout: Duration,
    pub default_restaurant_id: Option<String>,
    pub fare_min: f64,
    pub fare_max: f64,
}

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub dialog: DialogSettings,
    pub capture: CaptureConfig,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("FARE_MIN ({min}) must not exceed FARE_MAX ({max})")]
    InvalidFareRange { min: f64, max: f64 },
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string(), value)),
        None => Ok(default),
    }
}

fn millis_or(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default_ms: u64,
) -> Result<Duration, ConfigError> {
    parse_or(lookup, name, default_ms).map(Duration::from_millis)
}

impl DialogSettings {
    /// *   `CATALOG_URL`: (Optional) Base URL of the catalog API. When unset the file catalog is used.
    /// *   `CATALOG_FILE`: (Optional) JSON catalog file. Defaults to `fixtures/catalog.json`.
    /// *   `CATALOG_TIMEOUT_MS`: (Optional) HTTP timeout for catalog calls. Defaults to 3000.
    /// *   `DEFAULT_RESTAURANT_ID`: (Optional) Restaurant searched when a dish is named on its own.
    /// *   `FARE_MIN` / `FARE_MAX`: (Optional) Placeholder fare range in PLN. Defaults to 20 and 60.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let catalog = match lookup("CATALOG_URL").filter(|url| !url.trim().is_empty()) {
            Some(url) => CatalogSource::Remote(url),
            None => CatalogSource::File(PathBuf::from(
                lookup("CATALOG_FILE").unwrap_or_else(|| DEFAULT_CATALOG_FILE.to_string()),
            )),
        };

        let fare_min = parse_or(lookup, "FARE_MIN", 20.0)?;
        let fare_max = parse_or(lookup, "FARE_MAX", 60.0)?;
        if fare_min > fare_max {
            return Err(ConfigError::InvalidFareRange {
                min: fare_min,
                max: fare_max,
            });
        }

        Ok(Self {
            catalog,
            catalog_timeout: millis_or(lookup, "CATALOG_TIMEOUT_MS", 3000)?,
            default_restaurant_id: lookup("DEFAULT_RESTAURANT_ID").filter(|id| !id.is_empty()),
            fare_min,
            fare_max,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(&|name: &str| env::var(name).ok())
    }
}

/// Reads `RUST_LOG` as a single level, defaulting to INFO.
pub fn log_level(lookup: &impl Fn(&str) -> Option<String>) -> Result<Level, ConfigError> {
    let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
    log_level_str
        .parse::<Level>()
        .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Besides the [`DialogSettings`] variables:
    ///
    /// *   `SILENCE_TIMEOUT_MS`: (Optional) Silence that ends an utterance. Defaults to 1000.
    /// *   `HARD_STOP_MS`: (Optional) Longest a single capture may run. Defaults to 9000.
    /// *   `STOP_ON_FINAL`: (Optional) End capture as soon as a final result arrives. Defaults to true.
    /// *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(&|name: &str| env::var(name).ok())
    }

    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = CaptureConfig::default();
        let capture = CaptureConfig {
            silence_timeout: millis_or(
                lookup,
                "SILENCE_TIMEOUT_MS",
                defaults.silence_timeout.as_millis() as u64,
            )?,
            hard_stop: millis_or(lookup, "HARD_STOP_MS", defaults.hard_stop.as_millis() as u64)?,
            stop_on_final: parse_or(lookup, "STOP_ON_FINAL", defaults.stop_on_final)?,
        };

        Ok(Self {
            dialog: DialogSettings::from_lookup(lookup)?,
            capture,
            log_level: log_level(lookup)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::from_lookup(&lookup_from(&[])).unwrap();

        assert_eq!(
            config.dialog.catalog,
            CatalogSource::File(PathBuf::from(DEFAULT_CATALOG_FILE))
        );
        assert_eq!(config.dialog.catalog_timeout, Duration::from_millis(3000));
        assert_eq!(config.dialog.default_restaurant_id, None);
        assert_eq!((config.dialog.fare_min, config.dialog.fare_max), (20.0, 60.0));
        assert_eq!(config.capture.silence_timeout, Duration::from_millis(1000));
        assert_eq!(config.capture.hard_stop, Duration::from_millis(9000));
        assert!(config.capture.stop_on_final);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn remote_catalog_and_overrides() {
        let config = Config::from_lookup(&lookup_from(&[
            ("CATALOG_URL", "http://catalog:8080"),
            ("DEFAULT_RESTAURANT_ID", "kfc-kat"),
            ("SILENCE_TIMEOUT_MS", "1500"),
            ("STOP_ON_FINAL", "false"),
            ("RUST_LOG", "debug"),
        ]))
        .unwrap();

        assert_eq!(
            config.dialog.catalog,
            CatalogSource::Remote("http://catalog:8080".into())
        );
        assert_eq!(config.dialog.default_restaurant_id.as_deref(), Some("kfc-kat"));
        assert_eq!(config.capture.silence_timeout, Duration::from_millis(1500));
        assert!(!config.capture.stop_on_final);
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn rejects_bad_values() {
        let err = Config::from_lookup(&lookup_from(&[("HARD_STOP_MS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name, _) if name == "HARD_STOP_MS"));

        let err = Config::from_lookup(&lookup_from(&[("RUST_LOG", "loud")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLogLevel(_)));

        let err =
            DialogSettings::from_lookup(&lookup_from(&[("FARE_MIN", "80"), ("FARE_MAX", "60")]))
                .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFareRange { .. }));
    }
}
