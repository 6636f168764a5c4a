//! Environmental sensor station
//!
//! Samples a gas sensor, a temperature/pressure/humidity sensor and a light
//! sensor, then publishes each reading as a small JSON record over MQTT.

pub mod config;
pub mod mqtt;
pub mod publisher;
pub mod reading;
pub mod reporter;
pub mod sampler;
pub mod sensors;
pub mod session;
pub mod sim;
pub mod station;

#[cfg(test)]
mod testing;
