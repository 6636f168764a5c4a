//! Configuration management for the station
//!
//! Loads configuration from config.toml with environment variable overrides.
//! When no file is present the built-in defaults match the deployed device.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Complete station configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub station: StationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// MQTT broker and account configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_url: String,
    /// Client identifier; falls back to the username when empty
    #[serde(default)]
    pub client_id: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    #[serde(default = "default_control_channel")]
    pub control_channel: String,
    /// Full control topic, used verbatim instead of `<prefix>/<user>/sub/<channel>`
    #[serde(default)]
    pub control_topic: Option<String>,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_service_window_ms")]
    pub service_window_ms: u64,
}

/// Sampling loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    pub sample_interval_secs: u64,
    pub sea_level_hpa: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

fn default_topic_prefix() -> String {
    "data".to_string()
}

fn default_control_channel() -> String {
    "conf".to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_service_window_ms() -> u64 {
    100
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_url: "mqtt://mqtt.prod.konkerlabs.net:1883".to_string(),
            client_id: String::new(),
            username: "USER".to_string(),
            password: "PWD".to_string(),
            topic_prefix: default_topic_prefix(),
            control_channel: default_control_channel(),
            control_topic: None,
            keep_alive_secs: default_keep_alive_secs(),
            retry_delay_secs: default_retry_delay_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            service_window_ms: default_service_window_ms(),
        }
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: 60,
            sea_level_hpa: 1013.25,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig::default(),
            station: StationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// How the configuration was assembled, logged once tracing is up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadReport {
    /// No file was found; built-in defaults are in use
    pub used_defaults: bool,
    /// MQTT_PASSWORD replaced the configured password
    pub password_from_env: bool,
}

impl Config {
    /// Load configuration from file
    ///
    /// Environment variables override config file values:
    /// - MQTT_PASSWORD: Override MQTT password
    pub fn load<P: AsRef<Path>>(path: P) -> Result<(Self, LoadReport)> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.finish(false)
    }

    /// Load from `path` if it exists, otherwise use the built-in defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<(Self, LoadReport)> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }

        Self::default().finish(true)
    }

    fn finish(mut self, used_defaults: bool) -> Result<(Self, LoadReport)> {
        let password_from_env = self.apply_password_override(std::env::var("MQTT_PASSWORD").ok());
        self.validate()?;
        Ok((
            self,
            LoadReport {
                used_defaults,
                password_from_env,
            },
        ))
    }

    fn apply_password_override(&mut self, password: Option<String>) -> bool {
        match password {
            Some(password) => {
                self.mqtt.password = password;
                true
            }
            None => false,
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if !self.mqtt.broker_url.starts_with("mqtt://")
            && !self.mqtt.broker_url.starts_with("mqtts://")
        {
            anyhow::bail!(
                "Invalid MQTT broker URL: {} (must start with mqtt:// or mqtts://)",
                self.mqtt.broker_url
            );
        }

        if self.mqtt.username.is_empty() {
            anyhow::bail!("MQTT username must not be empty");
        }

        if self.mqtt.retry_delay_secs == 0 {
            anyhow::bail!("MQTT retry_delay_secs must be greater than 0");
        }

        if self.mqtt.connect_timeout_secs == 0 {
            anyhow::bail!("MQTT connect_timeout_secs must be greater than 0");
        }

        if self.mqtt.service_window_ms == 0 {
            anyhow::bail!("MQTT service_window_ms must be greater than 0");
        }

        if self.station.sample_interval_secs == 0 {
            anyhow::bail!("Station sample_interval_secs must be greater than 0");
        }

        let sea_level = self.station.sea_level_hpa;
        if sea_level.is_nan() || sea_level <= 0.0 {
            anyhow::bail!(
                "Invalid sea level pressure: {} hPa (must be positive)",
                self.station.sea_level_hpa
            );
        }

        Ok(())
    }
}

impl MqttConfig {
    /// Client identifier presented to the broker
    pub fn effective_client_id(&self) -> &str {
        if self.client_id.is_empty() {
            &self.username
        } else {
            &self.client_id
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn service_window(&self) -> Duration {
        Duration::from_millis(self.service_window_ms)
    }
}

impl StationConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }
}
