//! Human-readable diagnostic console
//!
//! Structured logs go through `tracing`; this is the plain operator-facing
//! text the device has always printed. Writes never fail from the caller's
//! point of view.

use crate::reading::Snapshot;
use crate::sensors::GasSensorFault;
use crate::session::ConnectFailure;
use std::io::{self, Stdout, Write};
use std::time::Duration;

pub struct Reporter<W> {
    console: W,
}

impl Reporter<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(console: W) -> Self {
        Self { console }
    }

    pub fn into_inner(self) -> W {
        self.console
    }

    /// Startup banner with the sensor init results
    pub fn startup(&mut self, light_ok: bool) {
        self.line(format_args!("Sensor station starting"));
        if light_ok {
            self.line(format_args!("BH1750 Advanced begin"));
        } else {
            self.line(format_args!("Error initialising BH1750"));
        }
    }

    pub fn connecting(&mut self) {
        let _ = write!(self.console, "Attempting MQTT connection...");
        let _ = self.console.flush();
    }

    pub fn connected(&mut self) {
        self.line(format_args!("connected"));
    }

    pub fn connect_failed(&mut self, failure: &ConnectFailure, retry_in: Duration) {
        self.line(format_args!(
            "failed, rc={} ({}) retrying in {} seconds",
            failure.code(),
            failure,
            retry_in.as_secs()
        ));
    }

    pub fn inbound(&mut self, topic: &str, payload: &[u8]) {
        self.line(format_args!(
            "Message arrived [{}] {}",
            topic,
            String::from_utf8_lossy(payload)
        ));
    }

    /// Readings block printed after every successful sample cycle
    pub fn snapshot(&mut self, snapshot: &Snapshot) {
        self.line(format_args!("CO2: {:.2} ppm", snapshot.co2));
        self.line(format_args!("TVOC: {:.2} ppb", snapshot.tvoc));
        self.line(format_args!(""));
        self.line(format_args!(
            "Temp: {:.2} C  RH: {:.2} %",
            snapshot.temperature, snapshot.humidity
        ));
        self.line(format_args!("{:.2} hPa", snapshot.pressure));
        self.line(format_args!("Approx. Altitude = {:.2} m", snapshot.altitude));
        self.line(format_args!(""));
        self.line(format_args!("Light: {:.2} lx", snapshot.lux));
        self.line(format_args!(""));
    }

    pub fn sensor_fault(&mut self, fault: &GasSensorFault) {
        self.line(format_args!("{fault}"));
    }

    fn line(&mut self, args: std::fmt::Arguments<'_>) {
        let _ = writeln!(self.console, "{args}");
        let _ = self.console.flush();
    }
}
