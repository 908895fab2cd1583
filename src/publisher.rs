//! Message bus producer.
//!
//! Publishes a batch of readings as one JSON envelope over HTTP. There is no
//! retry; a failed publish is returned to the caller.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::models::SensorReading;

// ---

/// Wire format of one published batch.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope {
    // ---
    pub batch_id: Uuid,
    pub events: Vec<SensorReading>,
}

/// Result of a publish call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishOutcome {
    // ---
    /// `None` when there was nothing to send.
    pub batch_id: Option<Uuid>,
    pub sent: usize,
}

#[derive(Debug, Clone)]
pub struct BusPublisher {
    client: reqwest::Client,
    url: String,
}

impl BusPublisher {
    // ---
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Send `readings` to the bus as a single envelope.
    pub async fn publish(&self, readings: &[SensorReading]) -> Result<PublishOutcome> {
        // ---
        if readings.is_empty() {
            info!("No valid records to send");
            return Ok(PublishOutcome {
                batch_id: None,
                sent: 0,
            });
        }

        let envelope = Envelope {
            batch_id: Uuid::new_v4(),
            events: readings.to_vec(),
        };

        info!(
            batch_id = %envelope.batch_id,
            "Sending {} records to {}",
            readings.len(),
            self.url
        );

        self.client
            .post(&self.url)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to reach message bus '{}': {}", self.url, e))?
            .error_for_status()
            .map_err(|e| anyhow!("Message bus rejected batch {}: {}", envelope.batch_id, e))?;

        info!(batch_id = %envelope.batch_id, "All records sent");

        Ok(PublishOutcome {
            batch_id: Some(envelope.batch_id),
            sent: readings.len(),
        })
    }
}
