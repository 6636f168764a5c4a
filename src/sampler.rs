//! Sensor sampling
//!
//! One call to [`Sampler::sample`] is one sampler cycle: check the gas sensor,
//! read everything if it has data, otherwise report its error register if it
//! flagged one. No retries; the next scheduled cycle simply tries again.

use crate::reading::Snapshot;
use crate::sensors::{EnvironmentalSensor, GasSensor, GasSensorFault, LightSensor, Result};
use tracing::{debug, info, warn};

/// Standard atmosphere at sea level, hPa
pub const SEA_LEVEL_PRESSURE_HPA: f32 = 1013.25;

/// Approximate altitude in metres for `pressure_hpa`, international barometric formula
pub fn altitude_from_pressure(pressure_hpa: f32, sea_level_hpa: f32) -> f32 {
    44330.0 * (1.0 - (pressure_hpa / sea_level_hpa).powf(0.1903))
}

/// What a sampler cycle produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    Ready(Snapshot),
    Fault(GasSensorFault),
    /// No data and no fault
    Idle,
}

/// Which sensors came up during [`Sampler::begin`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorStatus {
    pub gas: bool,
    pub environmental: bool,
    pub light: bool,
}

pub struct Sampler {
    gas: Box<dyn GasSensor>,
    environment: Box<dyn EnvironmentalSensor>,
    light: Box<dyn LightSensor>,
    sea_level_hpa: f32,
    /// Kept across cycles; only refreshed when the light sensor has a measurement
    last_lux: f32,
}

impl Sampler {
    pub fn new(
        gas: Box<dyn GasSensor>,
        environment: Box<dyn EnvironmentalSensor>,
        light: Box<dyn LightSensor>,
        sea_level_hpa: f32,
    ) -> Self {
        Self {
            gas,
            environment,
            light,
            sea_level_hpa,
            last_lux: 0.0,
        }
    }

    /// Initialise every sensor. Failures are logged, never fatal.
    pub fn begin(&mut self) -> SensorStatus {
        let gas = match self.gas.begin() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Gas sensor init failed");
                false
            }
        };
        let environmental = match self.environment.begin() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Environmental sensor init failed");
                false
            }
        };
        let light = match self.light.begin() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Light sensor init failed");
                false
            }
        };

        info!(gas, environmental, light, "Sensors initialised");
        SensorStatus {
            gas,
            environmental,
            light,
        }
    }

    /// Run one sampler cycle
    pub fn sample(&mut self) -> Result<SampleOutcome> {
        if self.gas.data_available()? {
            return self.read_all().map(SampleOutcome::Ready);
        }

        if self.gas.check_for_status_error()? {
            let fault = GasSensorFault::from_register(self.gas.error_register());
            warn!(fault = %fault, "Gas sensor reported an internal error");
            return Ok(SampleOutcome::Fault(fault));
        }

        debug!("Gas sensor has no new data");
        Ok(SampleOutcome::Idle)
    }

    fn read_all(&mut self) -> Result<Snapshot> {
        self.gas.read_algorithm_results()?;

        let temperature = self.environment.read_temperature()?;
        let pressure = self.environment.read_pressure()? / 100.0;
        let altitude = altitude_from_pressure(pressure, self.sea_level_hpa);
        let humidity = self.environment.read_humidity()?;

        self.gas.set_environmental_data(humidity, temperature)?;

        if self.light.measurement_ready()? {
            self.last_lux = self.light.read_light_level()?;
        }

        let snapshot = Snapshot {
            temperature,
            pressure,
            altitude,
            humidity,
            co2: f32::from(self.gas.co2()),
            tvoc: f32::from(self.gas.tvoc()),
            lux: self.last_lux,
        };

        debug!(?snapshot, "Sample cycle complete");
        Ok(snapshot)
    }
}
