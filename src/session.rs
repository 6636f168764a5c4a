//! Broker session lifecycle
//!
//! A session is either `Disconnected` or `Connected`. [`Session::step`] makes
//! at most one transition; [`Session::ensure_connected`] drives `step` with a
//! fixed retry delay until the session is up. There is no attempt limit and no
//! backoff growth: an unattended station keeps trying forever.
//!
//! ```text
//! Disconnected --(handshake ok, subscribe)--> Connected
//! Connected --(publish/service failure, link down)--> Disconnected
//! ```

use crate::reporter::Reporter;
use std::io::Write;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Why a handshake did not produce a session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectFailure {
    #[error("connection timed out")]
    Timeout,
    #[error("connection lost during handshake: {0}")]
    Lost(String),
    #[error("network connect failed: {0}")]
    Failed(String),
    #[error("broker refused connection: unacceptable protocol version")]
    BadProtocol,
    #[error("broker refused connection: client id rejected")]
    BadClientId,
    #[error("broker refused connection: server unavailable")]
    Unavailable,
    #[error("broker refused connection: bad username or password")]
    BadCredentials,
    #[error("broker refused connection: not authorized")]
    Unauthorized,
}

impl ConnectFailure {
    /// Numeric client state code printed on the console (`rc=`)
    pub fn code(&self) -> i8 {
        match self {
            ConnectFailure::Timeout => -4,
            ConnectFailure::Lost(_) => -3,
            ConnectFailure::Failed(_) => -2,
            ConnectFailure::BadProtocol => 1,
            ConnectFailure::BadClientId => 2,
            ConnectFailure::Unavailable => 3,
            ConnectFailure::BadCredentials => 4,
            ConnectFailure::Unauthorized => 5,
        }
    }
}

/// Failure of an established link
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,
    #[error("request rejected: {0}")]
    Request(String),
    #[error("link failure: {0}")]
    Link(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is not connected")]
    NotConnected,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub username: String,
    pub password: String,
}

/// Message received on a subscribed topic; never parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Network/session collaborator
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Perform the broker handshake
    async fn connect(&mut self, credentials: &Credentials) -> Result<(), ConnectFailure>;

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;

    /// Process pending I/O for up to `window`, returning anything that arrived
    async fn service(&mut self, window: Duration) -> Result<Vec<InboundMessage>, TransportError>;

    fn is_connected(&self) -> bool;
}

/// Source of the fixed-duration pauses
#[allow(async_fn_in_trait)]
pub trait Wait {
    async fn wait(&mut self, period: Duration);
}

/// Real-time pauses on the Tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioWait;

impl Wait for TokioWait {
    async fn wait(&mut self, period: Duration) {
        tokio::time::sleep(period).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
}

impl SessionState {
    /// Client state number for a settled session; never a handshake failure
    pub fn code(&self) -> i8 {
        match self {
            SessionState::Disconnected => -1,
            SessionState::Connected => 0,
        }
    }
}

/// Result of one [`Session::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Already connected, nothing done
    Ready,
    /// Handshake succeeded and the control topic was subscribed
    Connected,
    /// Handshake failed; try again after the delay
    RetryAfter(Duration),
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub credentials: Credentials,
    pub control_topic: String,
    pub retry_delay: Duration,
    pub service_window: Duration,
}

pub struct Session<T, W> {
    transport: T,
    wait: W,
    settings: SessionSettings,
    state: SessionState,
    failed_attempts: u64,
}

impl<T: Transport, W: Wait> Session<T, W> {
    /// Starts `Disconnected`
    pub fn new(transport: T, wait: W, settings: SessionSettings) -> Self {
        Self {
            transport,
            wait,
            settings,
            state: SessionState::Disconnected,
            failed_attempts: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn waiter(&self) -> &W {
        &self.wait
    }

    /// One transition of the session state machine
    pub async fn step<C: Write>(&mut self, reporter: &mut Reporter<C>) -> Step {
        if self.state == SessionState::Connected {
            if self.transport.is_connected() {
                return Step::Ready;
            }
            self.mark_disconnected("transport reports link down");
        }

        reporter.connecting();
        match self.transport.connect(&self.settings.credentials).await {
            Ok(()) => {
                reporter.connected();
                if let Err(e) = self.transport.subscribe(&self.settings.control_topic).await {
                    warn!(topic = %self.settings.control_topic, error = %e, "Control topic subscribe failed");
                }
                info!(
                    topic = %self.settings.control_topic,
                    failed_attempts = self.failed_attempts,
                    "MQTT session established"
                );
                self.state = SessionState::Connected;
                self.failed_attempts = 0;
                Step::Connected
            }
            Err(failure) => {
                self.failed_attempts += 1;
                warn!(
                    code = failure.code(),
                    error = %failure,
                    attempt = self.failed_attempts,
                    "MQTT connection failed"
                );
                reporter.connect_failed(&failure, self.settings.retry_delay);
                Step::RetryAfter(self.settings.retry_delay)
            }
        }
    }

    /// Block until the session is connected
    pub async fn ensure_connected<C: Write>(&mut self, reporter: &mut Reporter<C>) {
        loop {
            match self.step(reporter).await {
                Step::Ready | Step::Connected => return,
                Step::RetryAfter(delay) => self.wait.wait(delay).await,
            }
        }
    }

    pub async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SessionError> {
        if self.state != SessionState::Connected {
            return Err(SessionError::NotConnected);
        }

        match self.transport.publish(topic, payload).await {
            Ok(()) => {
                debug!(topic = topic, payload_len = payload.len(), "Published");
                Ok(())
            }
            Err(e) => {
                self.mark_disconnected(&e.to_string());
                Err(e.into())
            }
        }
    }

    /// Process pending transport I/O once
    pub async fn service<C: Write>(&mut self, reporter: &mut Reporter<C>) -> Result<(), SessionError> {
        let window = self.settings.service_window;
        self.service_for(window, reporter).await
    }

    /// Sleep for `period`, servicing the link while connected
    pub async fn idle<C: Write>(&mut self, period: Duration, reporter: &mut Reporter<C>) {
        let started = Instant::now();
        if self.state == SessionState::Connected {
            if let Err(e) = self.service_for(period, reporter).await {
                debug!(error = %e, "Link failed while idle");
            }
        }

        let remaining = period.saturating_sub(started.elapsed());
        if !remaining.is_zero() {
            self.wait.wait(remaining).await;
        }
    }

    async fn service_for<C: Write>(
        &mut self,
        window: Duration,
        reporter: &mut Reporter<C>,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Connected {
            return Err(SessionError::NotConnected);
        }

        match self.transport.service(window).await {
            Ok(messages) => {
                for message in &messages {
                    info!(topic = %message.topic, payload_len = message.payload.len(), "Inbound message");
                    reporter.inbound(&message.topic, &message.payload);
                }
                Ok(())
            }
            Err(e) => {
                self.mark_disconnected(&e.to_string());
                Err(e.into())
            }
        }
    }

    fn mark_disconnected(&mut self, reason: &str) {
        self.state = match self.state {
            SessionState::Connected => {
                warn!(reason = reason, "MQTT session lost");
                SessionState::Disconnected
            }
            SessionState::Disconnected => SessionState::Disconnected,
        };
        debug!(state = self.state.code(), "Session state");
    }
}
