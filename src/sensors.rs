//! Sensor capability traits
//!
//! The station talks to three drivers on the shared I2C bus: a CCS811-class
//! gas sensor, a BME280-class environmental sensor and a BH1750-class light
//! sensor. Register-level protocol is the driver's business; the sampler only
//! sees these traits, so tests and the host build can swap in other
//! implementations.

use std::fmt;
use thiserror::Error;

/// Driver-level failure
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("{sensor}: bus error: {message}")]
    Bus {
        sensor: &'static str,
        message: String,
    },
    #[error("{sensor}: not initialised")]
    NotInitialised { sensor: &'static str },
}

pub type Result<T> = std::result::Result<T, SensorError>;

/// Gas sensor (eCO2 / TVOC)
pub trait GasSensor {
    /// One-time initialisation
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    /// New algorithm results are waiting to be read
    fn data_available(&mut self) -> Result<bool>;

    /// Latch the current algorithm results so `co2`/`tvoc` return them
    fn read_algorithm_results(&mut self) -> Result<()>;

    /// eCO2 in ppm from the last latched results
    fn co2(&self) -> u16;

    /// TVOC in ppb from the last latched results
    fn tvoc(&self) -> u16;

    /// Environmental compensation inputs (relative humidity %, temperature °C)
    fn set_environmental_data(&mut self, humidity: f32, temperature: f32) -> Result<()>;

    /// The status register has its error bit set
    fn check_for_status_error(&mut self) -> Result<bool>;

    /// Raw ERROR_ID register; `0xFF` when the register could not be read
    fn error_register(&mut self) -> u8;
}

/// Temperature / pressure / humidity sensor
pub trait EnvironmentalSensor {
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    /// °C
    fn read_temperature(&mut self) -> Result<f32>;

    /// Pa
    fn read_pressure(&mut self) -> Result<f32>;

    /// %RH
    fn read_humidity(&mut self) -> Result<f32>;
}

/// Ambient light sensor
pub trait LightSensor {
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn measurement_ready(&mut self) -> Result<bool>;

    /// lux
    fn read_light_level(&mut self) -> Result<f32>;
}

/// Value the gas sensor driver returns when ERROR_ID cannot be read
pub const ERROR_REGISTER_UNREADABLE: u8 = 0xFF;

/// Named ERROR_ID bits, most significant first
const FAULT_FLAGS: [(u8, &str); 6] = [
    (5, "HeaterSupply"),
    (4, "HeaterFault"),
    (3, "MaxResistance"),
    (2, "MeasModeInvalid"),
    (1, "ReadRegInvalid"),
    (0, "MsgInvalid"),
];

/// Decoded gas sensor error report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasSensorFault {
    /// ERROR_ID itself could not be read
    RegisterUnreadable,
    /// Raw ERROR_ID value
    Flags(u8),
}

impl GasSensorFault {
    pub fn from_register(register: u8) -> Self {
        if register == ERROR_REGISTER_UNREADABLE {
            GasSensorFault::RegisterUnreadable
        } else {
            GasSensorFault::Flags(register)
        }
    }

    /// Names of the set flags, HeaterSupply first
    pub fn flag_names(&self) -> Vec<&'static str> {
        match self {
            GasSensorFault::RegisterUnreadable => Vec::new(),
            GasSensorFault::Flags(bits) => FAULT_FLAGS
                .iter()
                .filter(|&&(bit, _)| *bits & (1u8 << bit) != 0)
                .map(|(_, name)| *name)
                .collect(),
        }
    }
}

impl fmt::Display for GasSensorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GasSensorFault::RegisterUnreadable => write!(f, "Failed to get ERROR_ID register."),
            GasSensorFault::Flags(bits) => {
                let names = self.flag_names();
                if names.is_empty() {
                    write!(f, "Error: unknown (0x{bits:02X})")
                } else {
                    write!(f, "Error: {}", names.join(" "))
                }
            }
        }
    }
}
