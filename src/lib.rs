//! Directory-watching object-detection pipeline.
//!
//! New files in a watched directory are decoded, optionally masked, sent to
//! a remote detection service, annotated with any reported detections, and
//! handed to a configurable list of follow-up actions.

pub mod config;
pub mod pipeline;
pub mod telemetry;
