//! Per-file orchestration and the watch loop driving it.
//!
//! Each new file runs load → mask → detect → annotate → save → actions as
//! one independent task. Files do not share mutable state; a failure is
//! logged at the task boundary and the file is abandoned.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::config::WatchConfig;
use crate::telemetry;

use super::{
    actions::{ActionRegistry, Invocation},
    detector::{Detector, DetectorClient},
    loader, mask, overlay,
    surface::Surface,
    watch::{DirWatcher, WatchEvent},
};

/// Shared pieces handed to every per-file task.
pub struct PipelineContext {
    pub config: WatchConfig,
    pub detector: Arc<dyn Detector>,
    pub actions: Arc<ActionRegistry>,
}

/// Watch the configured directory and process each new file to completion.
/// Returns on Ctrl-C or when the watch channel closes.
pub async fn run(config: WatchConfig) -> Result<()> {
    let registry = ActionRegistry::builtin();
    registry.verify(&config.on_detections)?;
    registry.verify(&config.on_empty)?;

    if let Some(addr) = config.metrics_addr {
        telemetry::init_metrics_exporter(addr);
    }

    let detector = Arc::new(DetectorClient::new(
        config.detector.clone(),
        config.jpeg_quality,
    )?);
    let ctx = Arc::new(PipelineContext {
        config,
        detector,
        actions: Arc::new(registry),
    });

    let mut watcher = DirWatcher::start(&ctx.config.watch_dir)?;
    info!("watching {} for new images", ctx.config.watch_dir.display());

    loop {
        tokio::select! {
            event = watcher.next() => match event {
                Some(WatchEvent::Added(path)) => {
                    metrics::counter!("doodwatch_files_seen_total").increment(1);
                    let ctx = ctx.clone();
                    tokio::spawn(async move {
                        if let Err(err) = process_file(&ctx, &path).await {
                            metrics::counter!("doodwatch_files_failed_total").increment(1);
                            error!("Processing {} failed: {err:?}", path.display());
                        }
                    });
                }
                Some(WatchEvent::Error(err)) => {
                    // Watch-level errors do not stop the watcher.
                    warn!("Watch error: {err}");
                }
                None => {
                    warn!("Watch channel closed, stopping");
                    return Ok(());
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
        }
    }
}

/// Run one file through the full pipeline.
pub async fn process_file(ctx: &PipelineContext, path: &Path) -> Result<()> {
    let config = &ctx.config;
    info!("new image: {}", path.display());

    let decoded = loader::load(path, &config.load_retry).await?;
    let original = Surface::from_image(&decoded, config.canvas_width);
    drop(decoded);

    // The detector always sees the masked frame; whether the saved output
    // does as well is a configuration choice.
    let mut working = original.clone();
    mask::apply_mask(&mut working, &config.mask);

    let response = ctx.detector.detect(&working).await?;

    let (saved_path, detections) = match response.detections {
        Some(detections) => {
            info!("{}: {} detection(s)", path.display(), detections.len());
            metrics::counter!("doodwatch_detections_total").increment(detections.len() as u64);

            let mut output = if config.keep_mask { working } else { original };
            overlay::draw_detections(&mut output, &detections);

            let saved_path = resolve_save_path(path, config.output_dir.as_deref());
            let jpeg = output.to_jpeg(config.jpeg_quality)?;
            tokio::fs::write(&saved_path, jpeg)
                .await
                .with_context(|| format!("Failed to write {}", saved_path.display()))?;
            debug!("annotated image written to {}", saved_path.display());

            (Some(saved_path), Some(detections))
        }
        None => {
            info!("{}: service reported no detections", path.display());
            (None, None)
        }
    };

    let invocation = Invocation {
        original_path: path,
        saved_path: saved_path.as_deref(),
        detections: detections.as_deref(),
    };
    let list = if detections.is_some() {
        &config.on_detections
    } else {
        &config.on_empty
    };
    ctx.actions.dispatch(list, &invocation).await;

    metrics::counter!("doodwatch_files_processed_total").increment(1);
    Ok(())
}

/// Annotated output lands next to the original unless an output directory is
/// configured, in which case it keeps the original file name under that
/// directory.
pub fn resolve_save_path(original: &Path, output_dir: Option<&Path>) -> PathBuf {
    match (output_dir, original.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => original.to_path_buf(),
    }
}
