//! MQTT transport on top of rumqttc
//!
//! This module provides the production [`Transport`]:
//! - Performs the broker handshake with account credentials
//! - Queues publishes and subscriptions without blocking
//! - Polls the event loop only when the station asks it to (`service`)
//!
//! The event loop is never spawned. The station has a single flow of control
//! and every byte on the wire moves inside `connect` or `service`.

use crate::config::MqttConfig;
use crate::session::{ConnectFailure, Credentials, InboundMessage, Transport, TransportError};
use anyhow::{Context, Result};
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS,
};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, trace};

/// Requests buffered between the client handle and the event loop
const REQUEST_CAPACITY: usize = 16;

struct Link {
    client: AsyncClient,
    eventloop: EventLoop,
}

/// rumqttc-backed broker transport
pub struct MqttTransport {
    host: String,
    port: u16,
    tls: bool,
    keep_alive: Duration,
    connect_timeout: Duration,
    link: Option<Link>,
}

impl MqttTransport {
    /// Create a transport for the broker in `config`; nothing is dialled yet
    pub fn new(config: &MqttConfig) -> Result<Self> {
        let (host, port) = parse_broker_url(&config.broker_url)?;
        info!(host = %host, port = port, "MQTT transport configured");

        Ok(Self {
            host,
            port,
            tls: config.broker_url.starts_with("mqtts://"),
            keep_alive: config.keep_alive(),
            connect_timeout: config.connect_timeout(),
            link: None,
        })
    }

    fn options(&self, credentials: &Credentials) -> MqttOptions {
        let mut options = MqttOptions::new(&credentials.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_credentials(&credentials.username, &credentials.password);
        if self.tls {
            options.set_transport(rumqttc::Transport::tls_with_default_config());
        }
        options
    }
}

impl Transport for MqttTransport {
    async fn connect(&mut self, credentials: &Credentials) -> Result<(), ConnectFailure> {
        // A fresh client per handshake drops whatever the old link still had queued
        self.link = None;
        let (client, mut eventloop) = AsyncClient::new(self.options(credentials), REQUEST_CAPACITY);

        let handshake = async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        return match ack.code {
                            ConnectReturnCode::Success => Ok(()),
                            code => Err(refused(code)),
                        };
                    }
                    Ok(event) => trace!(?event, "MQTT event during handshake"),
                    Err(e) => return Err(connect_failure(e)),
                }
            }
        };

        match tokio::time::timeout(self.connect_timeout, handshake).await {
            Ok(Ok(())) => {
                debug!(host = %self.host, port = self.port, "MQTT handshake complete");
                self.link = Some(Link { client, eventloop });
                Ok(())
            }
            Ok(Err(failure)) => Err(failure),
            Err(_) => Err(ConnectFailure::Timeout),
        }
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let link = self.link.as_ref().ok_or(TransportError::NotConnected)?;
        link.client
            .try_subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| TransportError::Request(e.to_string()))?;
        debug!(topic = topic, "Subscribe queued");
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        let link = self.link.as_ref().ok_or(TransportError::NotConnected)?;
        link.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .map_err(|e| TransportError::Request(e.to_string()))
    }

    async fn service(&mut self, window: Duration) -> Result<Vec<InboundMessage>, TransportError> {
        let link = self.link.as_mut().ok_or(TransportError::NotConnected)?;
        let deadline = Instant::now() + window;
        let mut inbound = Vec::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            let polled = tokio::time::timeout(remaining, link.eventloop.poll()).await;
            match polled {
                // window elapsed with nothing left to do
                Err(_) => break,
                Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                    inbound.push(InboundMessage {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    });
                }
                Ok(Ok(event)) => trace!(?event, "MQTT event"),
                Ok(Err(e)) => {
                    error!(error = %e, "MQTT connection error");
                    self.link = None;
                    return Err(TransportError::Link(e.to_string()));
                }
            }
        }

        Ok(inbound)
    }

    fn is_connected(&self) -> bool {
        self.link.is_some()
    }
}

fn refused(code: ConnectReturnCode) -> ConnectFailure {
    match code {
        ConnectReturnCode::RefusedProtocolVersion => ConnectFailure::BadProtocol,
        ConnectReturnCode::BadClientId => ConnectFailure::BadClientId,
        ConnectReturnCode::ServiceUnavailable => ConnectFailure::Unavailable,
        ConnectReturnCode::BadUserNamePassword => ConnectFailure::BadCredentials,
        ConnectReturnCode::NotAuthorized => ConnectFailure::Unauthorized,
        ConnectReturnCode::Success => ConnectFailure::Lost("unexpected CONNACK".to_string()),
    }
}

fn connect_failure(error: ConnectionError) -> ConnectFailure {
    match error {
        ConnectionError::ConnectionRefused(code) => refused(code),
        ConnectionError::Io(e) => ConnectFailure::Failed(e.to_string()),
        other => ConnectFailure::Lost(other.to_string()),
    }
}

/// Handshake credentials from the broker account configuration
pub fn credentials(config: &MqttConfig) -> Credentials {
    Credentials {
        client_id: config.effective_client_id().to_string(),
        username: config.username.clone(),
        password: config.password.clone(),
    }
}

/// Build a topic name: `<prefix>/<account>/<direction>/<channel>`
///
/// Topic hierarchy:
/// - data/USER/pub/bme280_temperature
/// - data/USER/pub/ccs811_co2
/// - data/USER/sub/conf
pub fn build_topic(prefix: &str, account: &str, direction: &str, channel: &str) -> String {
    format!("{}/{}/{}/{}", prefix, account, direction, channel)
}

/// Inbound control topic, either configured verbatim or built from the account
pub fn control_topic(config: &MqttConfig) -> String {
    config.control_topic.clone().unwrap_or_else(|| {
        build_topic(&config.topic_prefix, &config.username, "sub", &config.control_channel)
    })
}

/// Parse MQTT broker URL into host and port
///
/// Supports:
/// - mqtt://localhost:1883
/// - mqtt://192.168.1.100:1883
/// - mqtts://broker.example.com:8883
fn parse_broker_url(url: &str) -> Result<(String, u16)> {
    let (url_without_protocol, default_port) = if let Some(rest) = url.strip_prefix("mqtt://") {
        (rest, 1883)
    } else if let Some(rest) = url.strip_prefix("mqtts://") {
        (rest, 8883)
    } else {
        anyhow::bail!("Invalid MQTT URL: must start with mqtt:// or mqtts://");
    };

    if let Some((host, port_str)) = url_without_protocol.split_once(':') {
        let port = port_str
            .parse::<u16>()
            .context("Invalid port number in MQTT URL")?;
        Ok((host.to_string(), port))
    } else {
        Ok((url_without_protocol.to_string(), default_port))
    }
}
