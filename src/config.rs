// config.rs
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::global_variables::{
    AMQP_URL, DEFAULT_SUMO_HOST, DEFAULT_SUMO_PORT, HAZARD_DISTANCE, HAZARD_LOG_CSV,
    QUEUE_V2I_WARNINGS, REFERENCE_LAT_DEG, REFERENCE_LON_DEG,
};
use crate::monitoring::GeoReference;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Deserialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for the hazard monitor binary. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub sumo_host: String,
    pub sumo_port: u16,
    /// Route file the default vehicle id is read from.
    pub route_file: Option<PathBuf>,
    pub amqp_url: String,
    pub warning_queue: String,
    pub hazard_log_csv: Option<PathBuf>,
    pub hazard_distance: f64,
    pub reference_lat: f64,
    pub reference_lon: f64,
    /// Stop after this many ticks; run until the simulation ends if unset.
    pub max_ticks: Option<u64>,
    pub read_timeout_ms: Option<u64>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            sumo_host: DEFAULT_SUMO_HOST.to_string(),
            sumo_port: DEFAULT_SUMO_PORT,
            route_file: None,
            amqp_url: AMQP_URL.to_string(),
            warning_queue: QUEUE_V2I_WARNINGS.to_string(),
            hazard_log_csv: Some(PathBuf::from(HAZARD_LOG_CSV)),
            hazard_distance: HAZARD_DISTANCE,
            reference_lat: REFERENCE_LAT_DEG,
            reference_lon: REFERENCE_LON_DEG,
            max_ticks: None,
            read_timeout_ms: None,
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sumo_host.trim().is_empty() {
            return Err(ConfigError::Invalid("sumo_host is empty".to_string()));
        }
        if !(self.hazard_distance.is_finite() && self.hazard_distance > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "hazard_distance must be positive, got {}",
                self.hazard_distance
            )));
        }
        if !(-90.0..=90.0).contains(&self.reference_lat) {
            return Err(ConfigError::Invalid(format!(
                "reference_lat out of range: {}",
                self.reference_lat
            )));
        }
        if !(-180.0..=180.0).contains(&self.reference_lon) {
            return Err(ConfigError::Invalid(format!(
                "reference_lon out of range: {}",
                self.reference_lon
            )));
        }
        Ok(())
    }

    pub fn reference(&self) -> GeoReference {
        GeoReference::new(self.reference_lat, self.reference_lon)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }
}

/// Loads the bridge configuration from a JSON file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<BridgeConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::FileNotFound(format!(
            "{} does not exist",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    let config: BridgeConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: BridgeConfig =
            serde_json::from_str(r#"{ "sumo_port": 8813, "max_ticks": 100 }"#).unwrap();
        assert_eq!(config.sumo_port, 8813);
        assert_eq!(config.max_ticks, Some(100));
        assert_eq!(config.sumo_host, DEFAULT_SUMO_HOST);
        assert_eq!(config.hazard_distance, HAZARD_DISTANCE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_distance() {
        let config = BridgeConfig {
            hazard_distance: 0.0,
            ..BridgeConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_file_is_reported() {
        assert!(matches!(
            load_config("/no/such/bridge.json"),
            Err(ConfigError::FileNotFound(_))
        ));
    }
}
