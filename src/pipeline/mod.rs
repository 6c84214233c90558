//! End-to-end detection pipeline: watch a directory, run each new image
//! through mask → detect → annotate → save, then dispatch follow-up actions.
//!
//! The module is split into focused submodules:
//! - `watch`: directory watch event source.
//! - `loader`: image ingestion tolerant of partially written files.
//! - `surface`: the drawing surface shared by mask, overlay, and save.
//! - `mask`: occlusion polygon applied before frames reach the detector.
//! - `detector`: detection service client and wire types.
//! - `overlay`: bounding-box and label rendering.
//! - `actions`: follow-up action registry and built-in actions.
//! - `process`: per-file orchestration and the watch loop.

pub mod actions;
pub mod detector;
pub mod loader;
pub mod mask;
pub mod overlay;
pub mod process;
pub mod surface;
pub mod watch;

/// Launch the pipeline with a loaded configuration.
pub use process::run;
