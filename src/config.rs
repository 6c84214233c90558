//! CLI argument parsing and the JSON configuration surface.

use std::{
    collections::BTreeMap,
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::pipeline::{loader::RetryPolicy, mask::MaskPoint};

const USAGE: &str = "Usage: doodwatch [--config] <config.json> [--verbose]";

/// Command-line arguments. Everything else lives in the config file.
#[derive(Clone, Debug)]
pub struct CliArgs {
    pub config_path: PathBuf,
    pub verbose: bool,
}

impl CliArgs {
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut config_path: Option<PathBuf> = None;
        let mut verbose = false;

        let mut idx = 1;
        while idx < args.len() {
            match args[idx].as_str() {
                "--config" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--config requires a value"))?;
                    config_path = Some(PathBuf::from(value));
                    idx += 1;
                }
                "--verbose" => {
                    verbose = true;
                    idx += 1;
                }
                "--help" | "-h" => {
                    bail!(USAGE);
                }
                arg if arg.starts_with('-') => {
                    bail!("Unrecognised flag: {arg}\n{USAGE}");
                }
                other => {
                    if config_path.is_some() {
                        bail!("Unexpected argument: {other}\n{USAGE}");
                    }
                    config_path = Some(PathBuf::from(other));
                    idx += 1;
                }
            }
        }

        let config_path = config_path.ok_or_else(|| anyhow!("Missing config path.\n{USAGE}"))?;
        Ok(Self {
            config_path,
            verbose,
        })
    }
}

/// One configured follow-up action: a registry name plus options passed to
/// the action verbatim.
#[derive(Clone, Debug, Deserialize)]
pub struct ActionDescriptor {
    pub module: String,
    #[serde(default)]
    pub options: serde_json::Value,
}

/// Detection service settings.
#[derive(Clone, Debug, Deserialize)]
pub struct DetectorConfig {
    pub url: String,
    #[serde(default = "default_detector_name")]
    pub name: String,
    /// Per-class confidence thresholds; `*` matches any class.
    #[serde(default = "default_thresholds")]
    pub detect: BTreeMap<String, f64>,
    /// Optional request timeout. Absent means the call may wait as long as
    /// the service does.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_detector_name() -> String {
    "default".to_string()
}

fn default_thresholds() -> BTreeMap<String, f64> {
    BTreeMap::from([("*".to_string(), 50.0)])
}

fn default_jpeg_quality() -> u8 {
    85
}

/// Full configuration file.
#[derive(Clone, Debug, Deserialize)]
pub struct WatchConfig {
    pub watch_dir: PathBuf,
    /// Resize the working surface to this width (height follows the source
    /// aspect ratio). Absent means the source dimensions are kept.
    #[serde(default)]
    pub canvas_width: Option<u32>,
    /// Occlusion polygon painted over the frame before detection.
    #[serde(default)]
    pub mask: Vec<MaskPoint>,
    pub detector: DetectorConfig,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Where annotated copies are written. Absent means overwrite in place.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Keep the occlusion mask visible in saved output.
    #[serde(default)]
    pub keep_mask: bool,
    /// Actions run when the service reports a `detections` field.
    #[serde(default)]
    pub on_detections: Vec<ActionDescriptor>,
    /// Actions run when the response carries no `detections` field.
    #[serde(default)]
    pub on_empty: Vec<ActionDescriptor>,
    #[serde(default)]
    pub load_retry: RetryPolicy,
    /// Expose Prometheus metrics on this address.
    #[serde(default)]
    pub metrics_addr: Option<SocketAddr>,
}

impl WatchConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: WatchConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(width) = self.canvas_width {
            if width == 0 {
                bail!("canvas_width must be greater than zero");
            }
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            bail!("jpeg_quality must be between 1 and 100");
        }
        for (idx, point) in self.mask.iter().enumerate() {
            if !(0.0..=1.0).contains(&point.x) || !(0.0..=1.0).contains(&point.y) {
                bail!(
                    "mask point #{idx} ({}, {}) is outside the normalised [0,1] range",
                    point.x,
                    point.y
                );
            }
        }
        Ok(())
    }
}
