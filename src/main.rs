//! Environmental sensor station
//!
//! This service:
//! - Samples CCS811 / BME280 / BH1750 readings once per interval
//! - Publishes each reading as a JSON record to its own MQTT topic
//! - Reconnects to the broker with a fixed delay whenever the session drops
//!
//! Architecture: sensors → sampler → snapshot → publisher → session → broker

use anyhow::{Context, Result};
use env_station::config::Config;
use env_station::mqtt::{self, MqttTransport};
use env_station::publisher::Publisher;
use env_station::reporter::Reporter;
use env_station::sampler::Sampler;
use env_station::session::{Session, SessionSettings, TokioWait};
use env_station::sim::{SimulatedEnvironment, SimulatedGasSensor, SimulatedLight};
use env_station::station::Station;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let (config, load_report) = Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load {}", config_path))?;

    // Structured logs go to stderr; stdout carries the reporter console
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!(config = %config_path, "Environmental sensor station starting");
    if load_report.used_defaults {
        warn!(path = %config_path, "No config file found, using defaults");
    }
    if load_report.password_from_env {
        info!("Using MQTT_PASSWORD from environment");
    }
    info!(
        broker = %config.mqtt.broker_url,
        client_id = config.mqtt.effective_client_id(),
        interval_secs = config.station.sample_interval_secs,
        "Configuration loaded"
    );

    let transport = MqttTransport::new(&config.mqtt).context("Failed to create MQTT transport")?;
    let settings = SessionSettings {
        credentials: mqtt::credentials(&config.mqtt),
        control_topic: mqtt::control_topic(&config.mqtt),
        retry_delay: config.mqtt.retry_delay(),
        service_window: config.mqtt.service_window(),
    };
    let session = Session::new(transport, TokioWait, settings);

    let sampler = Sampler::new(
        Box::new(SimulatedGasSensor::new()),
        Box::new(SimulatedEnvironment::new()),
        Box::new(SimulatedLight::new()),
        config.station.sea_level_hpa,
    );
    let publisher = Publisher::new(&config.mqtt.topic_prefix, &config.mqtt.username);

    let mut station = Station::new(
        session,
        sampler,
        publisher,
        Reporter::stdout(),
        config.station.sample_interval(),
    );
    station.begin();

    info!("Station running. Press Ctrl+C to stop.");
    tokio::select! {
        _ = station.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    info!("Environmental sensor station stopped");
    Ok(())
}
