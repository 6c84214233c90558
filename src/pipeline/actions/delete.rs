//! Removes the original file once processing is done.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{Action, Invocation};

/// Deletes the file that triggered the pipeline. The saved copy and the
/// detections are ignored.
pub struct DeleteAction;

#[async_trait]
impl Action for DeleteAction {
    async fn process(&self, _options: &Value, invocation: &Invocation<'_>) -> Result<()> {
        tokio::fs::remove_file(invocation.original_path)
            .await
            .with_context(|| {
                format!("Failed to delete {}", invocation.original_path.display())
            })?;
        debug!("deleted {}", invocation.original_path.display());
        Ok(())
    }
}
