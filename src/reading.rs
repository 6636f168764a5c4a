//! Metrics, readings and the per-cycle snapshot

use serde::Serialize;

/// The seven metrics published every successful sample cycle, in publish order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Temperature,
    Pressure,
    Altitude,
    Humidity,
    Co2,
    Tvoc,
    Illuminance,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Temperature,
        Metric::Pressure,
        Metric::Altitude,
        Metric::Humidity,
        Metric::Co2,
        Metric::Tvoc,
        Metric::Illuminance,
    ];

    /// Identifier sent as `deviceId`, also the last topic segment
    pub fn device_id(self) -> &'static str {
        match self {
            Metric::Temperature => "bme280_temperature",
            Metric::Pressure => "bme280_pressure",
            Metric::Altitude => "bme280_altitude",
            Metric::Humidity => "bme280_humidity",
            Metric::Co2 => "ccs811_co2",
            Metric::Tvoc => "ccs811_tvoc",
            Metric::Illuminance => "bh1750_lux",
        }
    }

    /// Unit label sent as `metric`
    pub fn unit(self) -> &'static str {
        match self {
            Metric::Temperature => "Celsius",
            Metric::Pressure => "Hectopascal",
            Metric::Altitude => "Meters",
            Metric::Humidity => "Percentage",
            Metric::Co2 => "Particles per million",
            Metric::Tvoc => "Particles per billion",
            Metric::Illuminance => "Lux",
        }
    }
}

/// A single scalar reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub metric: Metric,
    pub value: f32,
}

impl Reading {
    pub fn record(&self) -> Record<'static> {
        Record {
            device_id: self.metric.device_id(),
            metric: self.metric.unit(),
            value: self.value,
        }
    }
}

/// Outbound wire record: `{"deviceId":..,"metric":..,"value":..}`
///
/// Field order is the serialization order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record<'a> {
    pub device_id: &'a str,
    pub metric: &'a str,
    pub value: f32,
}

/// Everything one successful sample cycle produced
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Snapshot {
    /// °C
    pub temperature: f32,
    /// hPa
    pub pressure: f32,
    /// m
    pub altitude: f32,
    /// %RH
    pub humidity: f32,
    /// ppm
    pub co2: f32,
    /// ppb
    pub tvoc: f32,
    /// lux
    pub lux: f32,
}

impl Snapshot {
    pub fn value(&self, metric: Metric) -> f32 {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Pressure => self.pressure,
            Metric::Altitude => self.altitude,
            Metric::Humidity => self.humidity,
            Metric::Co2 => self.co2,
            Metric::Tvoc => self.tvoc,
            Metric::Illuminance => self.lux,
        }
    }

    /// Readings in publish order
    pub fn readings(&self) -> [Reading; 7] {
        Metric::ALL.map(|metric| Reading {
            metric,
            value: self.value(metric),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readings_follow_publish_order() {
        let snapshot = Snapshot {
            temperature: 1.0,
            pressure: 2.0,
            altitude: 3.0,
            humidity: 4.0,
            co2: 5.0,
            tvoc: 6.0,
            lux: 7.0,
        };

        let ids: Vec<_> = snapshot.readings().iter().map(|r| r.metric.device_id()).collect();
        assert_eq!(
            ids,
            [
                "bme280_temperature",
                "bme280_pressure",
                "bme280_altitude",
                "bme280_humidity",
                "ccs811_co2",
                "ccs811_tvoc",
                "bh1750_lux",
            ]
        );

        let values: Vec<_> = snapshot.readings().iter().map(|r| r.value).collect();
        assert_eq!(values, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_record_uses_unit_label() {
        let record = Reading {
            metric: Metric::Tvoc,
            value: 12.0,
        }
        .record();
        assert_eq!(record.device_id, "ccs811_tvoc");
        assert_eq!(record.metric, "Particles per billion");
    }
}
