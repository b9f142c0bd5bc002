//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "device-feeder.toml",
    "config.toml",
    "./config/device-feeder.toml",
    "/etc/device-feeder/config.toml",
];

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "DEVICE_FEEDER_CONFIG";

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found), apply environment variable
    /// overrides and validate the result
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file() {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        apply_overrides(&mut config, |key| env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
            warn!(?path, "Configured config file does not exist");
        }

        if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_into<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, target: &mut T) {
    if let Some(val) = lookup(key) {
        match val.trim().parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(key, value = %val, "Ignoring unparsable environment override"),
        }
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, target: &mut bool) {
    if let Some(val) = lookup(key) {
        *target = matches!(val.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes");
    }
}

/// Apply `DEVICE_FEEDER_*` overrides using the given variable lookup
pub(crate) fn apply_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    // AMQP
    parse_into(&lookup, "DEVICE_FEEDER_AMQP_URI", &mut config.amqp.uri);
    parse_into(&lookup, "DEVICE_FEEDER_AMQP_EXCHANGE", &mut config.amqp.exchange);
    parse_into(&lookup, "DEVICE_FEEDER_AMQP_QUEUE", &mut config.amqp.queue);
    parse_into(&lookup, "DEVICE_FEEDER_AMQP_ROUTING_KEY", &mut config.amqp.routing_key);
    parse_into(&lookup, "DEVICE_FEEDER_AMQP_RETRY_EXCHANGE", &mut config.amqp.retry_exchange);
    parse_into(&lookup, "DEVICE_FEEDER_AMQP_WAITING_QUEUE", &mut config.amqp.waiting_queue);

    // Feeder
    parse_into(&lookup, "DEVICE_FEEDER_MAX_RETRY_COUNT", &mut config.feeder.max_retry_count);
    parse_into(&lookup, "DEVICE_FEEDER_RETRY_PERIOD_SECONDS", &mut config.feeder.retry_period_seconds);
    parse_into(&lookup, "DEVICE_FEEDER_CONCURRENCY_LEVEL", &mut config.feeder.concurrency_level);
    parse_into(&lookup, "DEVICE_FEEDER_DEVICE_PORT", &mut config.feeder.device_port);
    parse_into(
        &lookup,
        "DEVICE_FEEDER_DEVICE_REQUEST_TIMEOUT_SECONDS",
        &mut config.feeder.device_request_timeout_seconds,
    );
    parse_flag(
        &lookup,
        "DEVICE_FEEDER_RESOLVER_NOT_FOUND_PERMANENT",
        &mut config.feeder.resolver_not_found_permanent,
    );

    // Collaborators
    parse_into(&lookup, "DEVICE_FEEDER_REGISTRY_URL", &mut config.registry.url);
    parse_into(&lookup, "DEVICE_FEEDER_REGISTRY_TIMEOUT_SECONDS", &mut config.registry.timeout_seconds);
    parse_into(&lookup, "DEVICE_FEEDER_LOOKUP_URL", &mut config.lookup.url);
    parse_into(&lookup, "DEVICE_FEEDER_LOOKUP_TIMEOUT_SECONDS", &mut config.lookup.timeout_seconds);

    // HTTP
    parse_into(&lookup, "DEVICE_FEEDER_HTTP_HOST", &mut config.http.host);
    parse_into(&lookup, "DEVICE_FEEDER_HTTP_PORT", &mut config.http.port);

    // General
    parse_flag(&lookup, "DEVICE_FEEDER_DEBUG_MODE", &mut config.debug_mode);
}
