//! Reading publisher
//!
//! Each reading becomes a three-key JSON record on its own topic. Metrics are
//! sent one at a time in fixed order, and the session is serviced after every
//! publish so the transport flushes before the next one goes out.

use crate::mqtt::build_topic;
use crate::reading::{Metric, Reading, Record, Snapshot};
use crate::reporter::Reporter;
use crate::session::{Session, Transport, Wait};
use std::collections::HashMap;
use std::io::Write;
use tracing::{debug, info, warn};

/// Serialize one record: `{"deviceId":..,"metric":..,"value":..}`
pub fn encode_record(device_id: &str, unit: &str, value: f32) -> serde_json::Result<String> {
    serde_json::to_string(&Record {
        device_id,
        metric: unit,
        value,
    })
}

pub struct Publisher {
    topics: HashMap<Metric, String>,
}

impl Publisher {
    /// Publish topics are `<prefix>/<account>/pub/<device id>`
    pub fn new(prefix: &str, account: &str) -> Self {
        let topics = Metric::ALL
            .iter()
            .map(|&metric| (metric, build_topic(prefix, account, "pub", metric.device_id())))
            .collect();
        Self { topics }
    }

    pub fn topic(&self, metric: Metric) -> &str {
        &self.topics[&metric]
    }

    /// Encode one value, publish it, then service the session once
    pub async fn format_and_send<T: Transport, W: Wait, C: Write>(
        &self,
        session: &mut Session<T, W>,
        reporter: &mut Reporter<C>,
        topic: &str,
        device_id: &str,
        unit: &str,
        value: f32,
    ) -> bool {
        let payload = match encode_record(device_id, unit, value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(device_id = device_id, error = %e, "Failed to encode record");
                return false;
            }
        };

        let sent = match session.publish(topic, payload.as_bytes()).await {
            Ok(()) => {
                debug!(topic = topic, payload = %payload, "Record published");
                true
            }
            Err(e) => {
                warn!(topic = topic, error = %e, "Failed to publish record");
                false
            }
        };

        if let Err(e) = session.service(reporter).await {
            debug!(error = %e, "Service after publish failed");
        }

        sent
    }

    pub async fn send_reading<T: Transport, W: Wait, C: Write>(
        &self,
        session: &mut Session<T, W>,
        reporter: &mut Reporter<C>,
        reading: &Reading,
    ) -> bool {
        let record = reading.record();
        self.format_and_send(
            session,
            reporter,
            self.topic(reading.metric),
            record.device_id,
            record.metric,
            record.value,
        )
        .await
    }

    /// Publish all seven readings in order; returns how many were accepted
    pub async fn publish_snapshot<T: Transport, W: Wait, C: Write>(
        &self,
        session: &mut Session<T, W>,
        reporter: &mut Reporter<C>,
        snapshot: &Snapshot,
    ) -> usize {
        let mut published = 0;
        for reading in snapshot.readings() {
            if self.send_reading(session, reporter, &reading).await {
                published += 1;
            }
        }

        info!(published = published, total = Metric::ALL.len(), "Published readings to MQTT topics");
        published
    }
}
