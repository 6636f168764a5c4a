//! The station main loop
//!
//! ```text
//! ensure connected -> sample -> report + publish -> idle -> repeat
//! ```

use crate::publisher::Publisher;
use crate::reporter::Reporter;
use crate::sampler::{SampleOutcome, Sampler};
use crate::session::{Session, Transport, Wait};
use std::io::Write;
use std::time::Duration;
use tracing::{info, warn};

/// What one cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleReport {
    /// Readings were taken; the count is how many publishes were accepted
    Published(usize),
    SensorFault,
    NoData,
    ReadFailed,
}

pub struct Station<T, W, C> {
    session: Session<T, W>,
    sampler: Sampler,
    publisher: Publisher,
    reporter: Reporter<C>,
    sample_interval: Duration,
    cycles: u64,
}

impl<T: Transport, W: Wait, C: Write> Station<T, W, C> {
    pub fn new(
        session: Session<T, W>,
        sampler: Sampler,
        publisher: Publisher,
        reporter: Reporter<C>,
        sample_interval: Duration,
    ) -> Self {
        Self {
            session,
            sampler,
            publisher,
            reporter,
            sample_interval,
            cycles: 0,
        }
    }

    pub fn session(&self) -> &Session<T, W> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<T, W> {
        &mut self.session
    }

    pub fn into_reporter(self) -> Reporter<C> {
        self.reporter
    }

    /// Initialise the sensors and print the startup banner
    pub fn begin(&mut self) {
        let status = self.sampler.begin();
        self.reporter.startup(status.light);
    }

    /// One sampler cycle, without the trailing sleep
    pub async fn cycle(&mut self) -> CycleReport {
        self.cycles += 1;
        self.session.ensure_connected(&mut self.reporter).await;

        match self.sampler.sample() {
            Ok(SampleOutcome::Ready(snapshot)) => {
                info!(
                    cycle = self.cycles,
                    temperature_c = snapshot.temperature,
                    pressure_hpa = snapshot.pressure,
                    humidity_pct = snapshot.humidity,
                    co2_ppm = snapshot.co2,
                    tvoc_ppb = snapshot.tvoc,
                    lux = snapshot.lux,
                    "Sample cycle"
                );
                self.reporter.snapshot(&snapshot);
                let published = self
                    .publisher
                    .publish_snapshot(&mut self.session, &mut self.reporter, &snapshot)
                    .await;
                CycleReport::Published(published)
            }
            Ok(SampleOutcome::Fault(fault)) => {
                self.reporter.sensor_fault(&fault);
                CycleReport::SensorFault
            }
            Ok(SampleOutcome::Idle) => CycleReport::NoData,
            Err(e) => {
                warn!(cycle = self.cycles, error = %e, "Sensor read failed, skipping cycle");
                CycleReport::ReadFailed
            }
        }
    }

    /// Run cycles forever
    pub async fn run(&mut self) {
        info!(interval_secs = self.sample_interval.as_secs(), "Starting sensor polling");
        loop {
            let report = self.cycle().await;
            info!(cycle = self.cycles, ?report, "Cycle finished");
            self.session.idle(self.sample_interval, &mut self.reporter).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::SEA_LEVEL_PRESSURE_HPA;
    use crate::session::SessionState;
    use crate::testing::{
        settings, FakeTransport, RecordingWait, ScriptedEnvironment, ScriptedGas, ScriptedLight,
    };

    fn station(
        transport: FakeTransport,
        gas: ScriptedGas,
        light: ScriptedLight,
    ) -> Station<FakeTransport, RecordingWait, Vec<u8>> {
        let sampler = Sampler::new(
            Box::new(gas),
            Box::new(ScriptedEnvironment::new(23.41, 100_950.0, 51.25)),
            Box::new(light),
            SEA_LEVEL_PRESSURE_HPA,
        );
        Station::new(
            Session::new(transport, RecordingWait::default(), settings()),
            sampler,
            Publisher::new("data", "USER"),
            Reporter::new(Vec::new()),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_cycle_publishes_seven_topics_in_order() {
        let mut station = station(
            FakeTransport::default(),
            ScriptedGas::ready(415, 12),
            ScriptedLight::ready(250.0),
        );

        assert_eq!(station.cycle().await, CycleReport::Published(7));

        let topics: Vec<_> = station
            .session()
            .transport()
            .published()
            .into_iter()
            .map(|(topic, _)| topic)
            .collect();
        assert_eq!(
            topics,
            [
                "data/USER/pub/bme280_temperature",
                "data/USER/pub/bme280_pressure",
                "data/USER/pub/bme280_altitude",
                "data/USER/pub/bme280_humidity",
                "data/USER/pub/ccs811_co2",
                "data/USER/pub/ccs811_tvoc",
                "data/USER/pub/bh1750_lux",
            ]
        );

        let payloads: Vec<_> = station
            .session()
            .transport()
            .published()
            .into_iter()
            .map(|(_, payload)| payload)
            .collect();
        assert_eq!(
            payloads[0],
            r#"{"deviceId":"bme280_temperature","metric":"Celsius","value":23.41}"#
        );
        assert_eq!(
            payloads[4],
            r#"{"deviceId":"ccs811_co2","metric":"Particles per million","value":415.0}"#
        );
        assert_eq!(payloads[6], r#"{"deviceId":"bh1750_lux","metric":"Lux","value":250.0}"#);
    }

    #[tokio::test]
    async fn test_repeated_cycles_produce_identical_records() {
        let mut station = station(
            FakeTransport::default(),
            ScriptedGas::ready(415, 12),
            ScriptedLight::ready(250.0),
        );

        station.cycle().await;
        station.cycle().await;

        let published = station.session().transport().published();
        assert_eq!(published.len(), 14);
        assert_eq!(published[..7], published[7..]);
    }

    #[tokio::test]
    async fn test_fault_cycle_publishes_nothing() {
        let mut station = station(
            FakeTransport::default(),
            ScriptedGas::faulted(0b0001_0000),
            ScriptedLight::ready(250.0),
        );

        assert_eq!(station.cycle().await, CycleReport::SensorFault);
        assert!(station.session().transport().published().is_empty());

        let console = String::from_utf8(station.into_reporter().into_inner()).unwrap();
        assert!(console.contains("Error: HeaterFault"));
        assert!(!console.contains("HeaterSupply"));
    }

    #[tokio::test]
    async fn test_cycle_waits_for_broker_first() {
        let transport = FakeTransport::with_connect_results(vec![
            Err(crate::session::ConnectFailure::Failed("refused".into())),
            Err(crate::session::ConnectFailure::Timeout),
        ]);
        let mut station = station(transport, ScriptedGas::idle(), ScriptedLight::ready(1.0));

        assert_eq!(station.cycle().await, CycleReport::NoData);
        assert_eq!(station.session().state(), SessionState::Connected);
        assert_eq!(station.session().waiter().waits.len(), 2);
    }

    #[tokio::test]
    async fn test_dropped_link_reconnects_next_cycle() {
        let mut station = station(
            FakeTransport::default(),
            ScriptedGas::ready(415, 12),
            ScriptedLight::ready(250.0),
        );
        station.cycle().await;

        station.session_mut().transport_mut().fail_next_publish();
        assert_eq!(station.cycle().await, CycleReport::Published(0));
        assert_eq!(station.session().state(), SessionState::Disconnected);

        assert_eq!(station.cycle().await, CycleReport::Published(7));
        assert_eq!(station.session().state(), SessionState::Connected);
    }
}
