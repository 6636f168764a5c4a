//! Simulated sensor drivers
//!
//! Stand-ins for the I2C drivers so the station runs on a host with no bus
//! attached. Values drift slowly and deterministically from tick to tick.

use crate::sensors::{EnvironmentalSensor, GasSensor, LightSensor, Result};
use tracing::debug;

/// CCS811 stand-in
#[derive(Debug, Default)]
pub struct SimulatedGasSensor {
    tick: u64,
    co2: u16,
    tvoc: u16,
    compensation: Option<(f32, f32)>,
}

impl SimulatedGasSensor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last (humidity, temperature) written as compensation
    pub fn compensation(&self) -> Option<(f32, f32)> {
        self.compensation
    }
}

impl GasSensor for SimulatedGasSensor {
    fn begin(&mut self) -> Result<()> {
        debug!("Simulated CCS811 begin");
        Ok(())
    }

    fn data_available(&mut self) -> Result<bool> {
        Ok(true)
    }

    fn read_algorithm_results(&mut self) -> Result<()> {
        self.tick = self.tick.wrapping_add(1);
        // drier air reads slightly higher, as an uncompensated sensor would
        let humidity_bias = self
            .compensation
            .map(|(humidity, _)| ((50.0 - humidity).max(0.0) / 2.0) as u16)
            .unwrap_or(0);
        self.co2 = 400 + (self.tick % 12) as u16 * 15 + humidity_bias;
        self.tvoc = (self.co2 - 400) / 3;
        Ok(())
    }

    fn co2(&self) -> u16 {
        self.co2
    }

    fn tvoc(&self) -> u16 {
        self.tvoc
    }

    fn set_environmental_data(&mut self, humidity: f32, temperature: f32) -> Result<()> {
        self.compensation = Some((humidity, temperature));
        Ok(())
    }

    fn check_for_status_error(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn error_register(&mut self) -> u8 {
        0
    }
}

/// BME280 stand-in
#[derive(Debug, Default)]
pub struct SimulatedEnvironment {
    tick: u64,
}

impl SimulatedEnvironment {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EnvironmentalSensor for SimulatedEnvironment {
    fn read_temperature(&mut self) -> Result<f32> {
        // temperature is read first each cycle, so it advances the tick
        self.tick = self.tick.wrapping_add(1);
        Ok(22.0 + (self.tick % 10) as f32 * 0.15)
    }

    fn read_pressure(&mut self) -> Result<f32> {
        Ok(101_000.0 + (self.tick % 6) as f32 * 25.0)
    }

    fn read_humidity(&mut self) -> Result<f32> {
        Ok(45.0 + (self.tick % 8) as f32 * 0.5)
    }
}

/// BH1750 stand-in
#[derive(Debug, Default)]
pub struct SimulatedLight {
    tick: u64,
}

impl SimulatedLight {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LightSensor for SimulatedLight {
    fn measurement_ready(&mut self) -> Result<bool> {
        Ok(true)
    }

    fn read_light_level(&mut self) -> Result<f32> {
        self.tick = self.tick.wrapping_add(1);
        Ok(300.0 + (self.tick % 5) as f32 * 12.5)
    }
}
