//! Detection service client and wire types.
//!
//! The service speaks the DOODS JSON dialect: a request carries the detector
//! name, per-class thresholds, and a base64 image; the response either has a
//! `detections` list (possibly empty) or omits the field entirely. That
//! distinction is load-bearing: field presence, not list length, decides
//! which action list fires downstream.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DetectorConfig;

use super::surface::Surface;

/// Single detection, with coordinates normalised to the processed surface.
/// `left <= right` / `top <= bottom` is not enforced; inverted boxes flow
/// through to the renderer as given.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Detection {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub label: String,
    pub confidence: f64,
}

/// Detector response. `detections` is `None` when the service omitted the
/// field, which is a different outcome from an empty list.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub detections: Option<Vec<Detection>>,
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    detector_name: &'a str,
    detect: &'a BTreeMap<String, f64>,
    data: String,
}

/// Capability the orchestrator talks to, so tests can stub the remote
/// service.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, surface: &Surface) -> Result<DetectResponse>;
}

/// HTTP client for a remote detection service.
pub struct DetectorClient {
    http: reqwest::Client,
    config: DetectorConfig,
    jpeg_quality: u8,
}

impl DetectorClient {
    pub fn new(config: DetectorConfig, jpeg_quality: u8) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build().context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            config,
            jpeg_quality,
        })
    }
}

#[async_trait]
impl Detector for DetectorClient {
    async fn detect(&self, surface: &Surface) -> Result<DetectResponse> {
        let jpeg = surface.to_jpeg(self.jpeg_quality)?;
        let body = DetectRequest {
            detector_name: &self.config.name,
            detect: &self.config.detect,
            data: STANDARD.encode(&jpeg),
        };

        debug!(
            "sending {}x{} frame to {}",
            surface.width(),
            surface.height(),
            self.config.url
        );
        let response = self
            .http
            .post(&self.config.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Detection request to {} failed", self.config.url))?
            .error_for_status()
            .context("Detection service returned an error status")?;

        let parsed = response
            .json::<DetectResponse>()
            .await
            .context("Detection service returned malformed JSON")?;
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_detections_field_parses_to_none() {
        let response: DetectResponse = serde_json::from_str("{}").unwrap();
        assert!(response.detections.is_none());
    }

    #[test]
    fn empty_detections_list_is_present_but_empty() {
        let response: DetectResponse = serde_json::from_str(r#"{"detections": []}"#).unwrap();
        let detections = response.detections.expect("field should be present");
        assert!(detections.is_empty());
    }

    #[test]
    fn populated_detections_parse_fully() {
        let response: DetectResponse = serde_json::from_str(
            r#"{
                "detections": [
                    {
                        "left": 0.1, "top": 0.2, "right": 0.5, "bottom": 0.7,
                        "label": "person", "confidence": 0.9
                    }
                ]
            }"#,
        )
        .unwrap();
        let detections = response.detections.unwrap();
        assert_eq!(
            detections,
            vec![Detection {
                left: 0.1,
                top: 0.2,
                right: 0.5,
                bottom: 0.7,
                label: "person".to_string(),
                confidence: 0.9,
            }]
        );
    }

    #[test]
    fn request_body_carries_the_wire_field_names() {
        let detect = BTreeMap::from([("*".to_string(), 50.0)]);
        let body = DetectRequest {
            detector_name: "default",
            detect: &detect,
            data: STANDARD.encode(b"jpeg-bytes"),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["detector_name"], "default");
        assert_eq!(json["detect"]["*"], 50.0);
        assert_eq!(json["data"], STANDARD.encode(b"jpeg-bytes"));
    }
}
