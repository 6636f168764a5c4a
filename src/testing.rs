//! Test doubles shared by the unit tests

use crate::sensors::{EnvironmentalSensor, GasSensor, LightSensor, Result, SensorError};
use crate::session::{
    ConnectFailure, Credentials, InboundMessage, SessionSettings, Transport, TransportError, Wait,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

pub fn settings() -> SessionSettings {
    SessionSettings {
        credentials: Credentials {
            client_id: "USER".to_string(),
            username: "USER".to_string(),
            password: "PWD".to_string(),
        },
        control_topic: "data/USER/sub/conf".to_string(),
        retry_delay: Duration::from_secs(5),
        service_window: Duration::from_millis(100),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect,
    Subscribe(String),
    Publish { topic: String, payload: Vec<u8> },
    Service(Duration),
}

/// Records every call; connect results are scripted, then succeed
#[derive(Debug, Default)]
pub struct FakeTransport {
    connect_results: VecDeque<std::result::Result<(), ConnectFailure>>,
    calls: Vec<TransportCall>,
    inbound: Vec<InboundMessage>,
    connected: bool,
    fail_publish: bool,
    fail_service: bool,
}

impl FakeTransport {
    pub fn with_connect_results(results: Vec<std::result::Result<(), ConnectFailure>>) -> Self {
        Self {
            connect_results: results.into(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.clone()
    }

    /// (topic, payload) of every publish attempt
    pub fn published(&self) -> Vec<(String, String)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                TransportCall::Publish { topic, payload } => {
                    Some((topic.clone(), String::from_utf8_lossy(payload).into_owned()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn fail_next_publish(&mut self) {
        self.fail_publish = true;
    }

    pub fn fail_next_service(&mut self) {
        self.fail_service = true;
    }

    pub fn drop_link(&mut self) {
        self.connected = false;
    }

    pub fn push_inbound(&mut self, topic: &str, payload: &[u8]) {
        self.inbound.push(InboundMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
    }
}

impl Transport for FakeTransport {
    async fn connect(&mut self, _credentials: &Credentials) -> std::result::Result<(), ConnectFailure> {
        self.calls.push(TransportCall::Connect);
        let result = self.connect_results.pop_front().unwrap_or(Ok(()));
        self.connected = result.is_ok();
        result
    }

    async fn subscribe(&mut self, topic: &str) -> std::result::Result<(), TransportError> {
        self.calls.push(TransportCall::Subscribe(topic.to_string()));
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> std::result::Result<(), TransportError> {
        self.calls.push(TransportCall::Publish {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
        if std::mem::take(&mut self.fail_publish) {
            self.connected = false;
            return Err(TransportError::Link("connection reset".to_string()));
        }
        Ok(())
    }

    async fn service(
        &mut self,
        window: Duration,
    ) -> std::result::Result<Vec<InboundMessage>, TransportError> {
        self.calls.push(TransportCall::Service(window));
        if std::mem::take(&mut self.fail_service) {
            self.connected = false;
            return Err(TransportError::Link("connection reset".to_string()));
        }
        Ok(std::mem::take(&mut self.inbound))
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Records requested pauses instead of sleeping
#[derive(Debug, Default)]
pub struct RecordingWait {
    pub waits: Vec<Duration>,
}

impl Wait for RecordingWait {
    async fn wait(&mut self, period: Duration) {
        self.waits.push(period);
    }
}

pub type CompensationLog = Rc<RefCell<Vec<(f32, f32)>>>;

enum GasMode {
    Ready { co2: u16, tvoc: u16 },
    Faulted(u8),
    Idle,
}

pub struct ScriptedGas {
    mode: GasMode,
    latched: (u16, u16),
    compensation: CompensationLog,
}

impl ScriptedGas {
    fn with_mode(mode: GasMode) -> Self {
        Self {
            mode,
            latched: (0, 0),
            compensation: Rc::default(),
        }
    }

    pub fn ready(co2: u16, tvoc: u16) -> Self {
        Self::with_mode(GasMode::Ready { co2, tvoc })
    }

    pub fn faulted(register: u8) -> Self {
        Self::with_mode(GasMode::Faulted(register))
    }

    pub fn idle() -> Self {
        Self::with_mode(GasMode::Idle)
    }

    /// Every (humidity, temperature) pair written as compensation
    pub fn compensation_log(&self) -> CompensationLog {
        Rc::clone(&self.compensation)
    }
}

impl GasSensor for ScriptedGas {
    fn data_available(&mut self) -> Result<bool> {
        Ok(matches!(self.mode, GasMode::Ready { .. }))
    }

    fn read_algorithm_results(&mut self) -> Result<()> {
        if let GasMode::Ready { co2, tvoc } = self.mode {
            self.latched = (co2, tvoc);
        }
        Ok(())
    }

    fn co2(&self) -> u16 {
        self.latched.0
    }

    fn tvoc(&self) -> u16 {
        self.latched.1
    }

    fn set_environmental_data(&mut self, humidity: f32, temperature: f32) -> Result<()> {
        self.compensation.borrow_mut().push((humidity, temperature));
        Ok(())
    }

    fn check_for_status_error(&mut self) -> Result<bool> {
        Ok(matches!(self.mode, GasMode::Faulted(_)))
    }

    fn error_register(&mut self) -> u8 {
        match self.mode {
            GasMode::Faulted(register) => register,
            _ => 0,
        }
    }
}

pub struct ScriptedEnvironment {
    values: Option<(f32, f32, f32)>,
}

impl ScriptedEnvironment {
    /// Temperature °C, pressure Pa, humidity %
    pub fn new(temperature: f32, pressure: f32, humidity: f32) -> Self {
        Self {
            values: Some((temperature, pressure, humidity)),
        }
    }

    pub fn failing() -> Self {
        Self { values: None }
    }

    fn values(&self) -> Result<(f32, f32, f32)> {
        self.values.ok_or_else(|| SensorError::Bus {
            sensor: "bme280",
            message: "no ack".to_string(),
        })
    }
}

impl EnvironmentalSensor for ScriptedEnvironment {
    fn read_temperature(&mut self) -> Result<f32> {
        Ok(self.values()?.0)
    }

    fn read_pressure(&mut self) -> Result<f32> {
        Ok(self.values()?.1)
    }

    fn read_humidity(&mut self) -> Result<f32> {
        Ok(self.values()?.2)
    }
}

/// Light sensor that plays back a script; `None` means not ready
pub struct ScriptedLight {
    script: VecDeque<Option<f32>>,
    repeat: Option<f32>,
    pending: Option<f32>,
    fail_begin: bool,
}

impl ScriptedLight {
    /// Always ready with the same level
    pub fn ready(lux: f32) -> Self {
        Self {
            script: VecDeque::new(),
            repeat: Some(lux),
            pending: None,
            fail_begin: false,
        }
    }

    /// One entry per `measurement_ready` call, never ready once exhausted
    pub fn sequence(script: Vec<Option<f32>>) -> Self {
        Self {
            script: script.into(),
            repeat: None,
            pending: None,
            fail_begin: false,
        }
    }

    pub fn failing_begin() -> Self {
        Self {
            fail_begin: true,
            ..Self::ready(0.0)
        }
    }
}

impl LightSensor for ScriptedLight {
    fn begin(&mut self) -> Result<()> {
        if self.fail_begin {
            return Err(SensorError::NotInitialised { sensor: "bh1750" });
        }
        Ok(())
    }

    fn measurement_ready(&mut self) -> Result<bool> {
        self.pending = match self.script.pop_front() {
            Some(entry) => entry,
            None => self.repeat,
        };
        Ok(self.pending.is_some())
    }

    fn read_light_level(&mut self) -> Result<f32> {
        self.pending.take().ok_or(SensorError::Bus {
            sensor: "bh1750",
            message: "read without measurement".to_string(),
        })
    }
}
