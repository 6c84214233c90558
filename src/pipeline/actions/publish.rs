//! Publishes detection labels over MQTT.
//!
//! The broker connection is established on the first invocation and shared
//! by every later one; it is never torn down. The once-cell guard makes the
//! first connection exactly-once even when several files finish at the same
//! time, and a failed attempt leaves the cell empty so a later invocation
//! can retry.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::{Action, Invocation};
use crate::pipeline::detector::Detection;

#[derive(Debug, Deserialize)]
struct MqttActionOptions {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    topic: String,
    #[serde(default = "default_client_id")]
    client_id: String,
    #[serde(default = "default_delimiter")]
    delimiter: String,
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "doodwatch".to_string()
}

fn default_delimiter() -> String {
    ",".to_string()
}

pub struct MqttAction {
    client: OnceCell<AsyncClient>,
}

impl Default for MqttAction {
    fn default() -> Self {
        Self::new()
    }
}

impl MqttAction {
    pub fn new() -> Self {
        Self {
            client: OnceCell::new(),
        }
    }

    async fn client(&self, options: &MqttActionOptions) -> Result<&AsyncClient> {
        self.client
            .get_or_try_init(|| async {
                debug!(
                    "connecting to mqtt broker {}:{}",
                    options.host, options.port
                );
                let mqtt_options = MqttOptions::new(
                    options.client_id.clone(),
                    options.host.clone(),
                    options.port,
                );
                let (client, mut event_loop) = AsyncClient::new(mqtt_options, 16);
                // The event loop must keep polling for the client to make
                // progress; it lives for the rest of the process.
                tokio::spawn(async move {
                    loop {
                        if let Err(err) = event_loop.poll().await {
                            warn!("mqtt event loop error: {err}");
                            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                        }
                    }
                });
                Ok(client)
            })
            .await
    }
}

/// Join the detection labels into a single payload string.
fn payload_for(detections: Option<&[Detection]>, delimiter: &str) -> String {
    detections
        .unwrap_or(&[])
        .iter()
        .map(|detection| detection.label.as_str())
        .collect::<Vec<_>>()
        .join(delimiter)
}

#[async_trait]
impl Action for MqttAction {
    async fn process(&self, options: &Value, invocation: &Invocation<'_>) -> Result<()> {
        let options: MqttActionOptions =
            serde_json::from_value(options.clone()).context("Invalid mqtt action options")?;

        let payload = payload_for(invocation.detections, &options.delimiter);
        let client = self.client(&options).await?;
        client
            .publish(options.topic.as_str(), QoS::AtLeastOnce, false, payload.clone())
            .await
            .with_context(|| format!("Failed to publish to {}", options.topic))?;
        debug!("published '{payload}' to {}", options.topic);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(label: &str) -> Detection {
        Detection {
            left: 0.0,
            top: 0.0,
            right: 1.0,
            bottom: 1.0,
            label: label.to_string(),
            confidence: 0.5,
        }
    }

    #[test]
    fn options_fill_in_defaults() {
        let options: MqttActionOptions = serde_json::from_value(serde_json::json!({
            "host": "broker.local",
            "topic": "alerts"
        }))
        .unwrap();
        assert_eq!(options.port, 1883);
        assert_eq!(options.client_id, "doodwatch");
        assert_eq!(options.delimiter, ",");
    }

    #[test]
    fn missing_required_options_are_rejected() {
        let result: std::result::Result<MqttActionOptions, _> =
            serde_json::from_value(serde_json::json!({ "host": "broker.local" }));
        assert!(result.is_err());
    }

    #[test]
    fn payload_joins_labels_with_the_delimiter() {
        let detections = [detection("person"), detection("dog"), detection("car")];
        assert_eq!(payload_for(Some(&detections), ","), "person,dog,car");
        assert_eq!(payload_for(Some(&detections), " | "), "person | dog | car");
    }

    #[test]
    fn payload_is_empty_without_detections() {
        assert_eq!(payload_for(None, ","), "");
        assert_eq!(payload_for(Some(&[]), ","), "");
    }
}
