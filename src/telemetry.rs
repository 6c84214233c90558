//! Telemetry helpers for tracing output and the optional Prometheus exporter.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// level.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_timer(fmt::time::uptime()),
        )
        .try_init();
}

/// Start the Prometheus scrape endpoint. Must be called from within a tokio
/// runtime; a failure is logged rather than fatal since metrics are not
/// required for the pipeline to run.
pub fn init_metrics_exporter(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => info!("Prometheus metrics exposed on http://{addr}/metrics"),
        Err(err) => warn!("Failed to start metrics exporter on {addr}: {err}"),
    }
}
