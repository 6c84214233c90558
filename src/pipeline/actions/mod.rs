//! Follow-up actions dispatched after a file finishes the pipeline.
//!
//! Actions are resolved by name from a registry built at startup and run
//! strictly in configuration order, each awaited to completion before the
//! next starts. A failing action is logged and counted; the rest of the
//! list still runs.

mod delete;
mod publish;

pub use delete::DeleteAction;
pub use publish::MqttAction;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error};

use crate::config::ActionDescriptor;

use super::detector::Detection;

/// Context handed uniformly to every action invocation.
#[derive(Clone, Copy, Debug)]
pub struct Invocation<'a> {
    /// Path of the file that triggered the pipeline.
    pub original_path: &'a Path,
    /// Where the annotated copy was written; `None` when the service
    /// reported no detections.
    pub saved_path: Option<&'a Path>,
    /// Detections from the service; `None` when the field was absent.
    pub detections: Option<&'a [Detection]>,
}

/// A named follow-up action. Implementations receive their configured
/// options verbatim and may keep state across invocations (e.g. a broker
/// connection).
#[async_trait]
pub trait Action: Send + Sync {
    async fn process(&self, options: &Value, invocation: &Invocation<'_>) -> Result<()>;
}

/// Registry mapping configured action names to implementations.
pub struct ActionRegistry {
    actions: HashMap<&'static str, Arc<dyn Action>>,
}

impl ActionRegistry {
    /// Registry with the built-in action set.
    pub fn builtin() -> Self {
        Self::empty()
            .with_action("delete", Arc::new(DeleteAction))
            .with_action("mqtt", Arc::new(MqttAction::new()))
    }

    pub fn empty() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Register an action under a name, replacing any previous entry.
    pub fn with_action(mut self, name: &'static str, action: Arc<dyn Action>) -> Self {
        self.actions.insert(name, action);
        self
    }

    /// Reject unknown action names up front so a configuration typo fails
    /// at startup rather than per file.
    pub fn verify(&self, descriptors: &[ActionDescriptor]) -> Result<()> {
        for descriptor in descriptors {
            if !self.actions.contains_key(descriptor.module.as_str()) {
                bail!("Unknown action module: {}", descriptor.module);
            }
        }
        Ok(())
    }

    /// Run the configured actions in order. Failures are logged and do not
    /// stop later actions.
    pub async fn dispatch(&self, descriptors: &[ActionDescriptor], invocation: &Invocation<'_>) {
        for descriptor in descriptors {
            let Some(action) = self.actions.get(descriptor.module.as_str()) else {
                error!("Unknown action module: {}", descriptor.module);
                metrics::counter!("doodwatch_action_failures_total", "action" => descriptor.module.clone())
                    .increment(1);
                continue;
            };

            debug!("running action {}", descriptor.module);
            if let Err(err) = action.process(&descriptor.options, invocation).await {
                error!("Action {} failed: {err:?}", descriptor.module);
                metrics::counter!("doodwatch_action_failures_total", "action" => descriptor.module.clone())
                    .increment(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    fn descriptor(module: &str) -> ActionDescriptor {
        ActionDescriptor {
            module: module.to_string(),
            options: Value::Null,
        }
    }

    fn invocation(path: &Path) -> Invocation<'_> {
        Invocation {
            original_path: path,
            saved_path: None,
            detections: None,
        }
    }

    /// Records begin/end markers so tests can assert strict sequencing.
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl Action for Recorder {
        async fn process(&self, _options: &Value, _invocation: &Invocation<'_>) -> Result<()> {
            self.log.lock().unwrap().push(format!("{}:begin", self.name));
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.log.lock().unwrap().push(format!("{}:end", self.name));
            if self.fail {
                return Err(anyhow!("{} exploded", self.name));
            }
            Ok(())
        }
    }

    fn recording_registry(log: &Arc<Mutex<Vec<String>>>) -> ActionRegistry {
        let recorder = |name: &'static str, fail: bool| -> Arc<dyn Action> {
            Arc::new(Recorder {
                name,
                log: log.clone(),
                fail,
            })
        };
        ActionRegistry::empty()
            .with_action("a", recorder("a", false))
            .with_action("b", recorder("b", true))
            .with_action("c", recorder("c", false))
    }

    #[tokio::test]
    async fn actions_run_in_order_and_to_completion() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = recording_registry(&log);
        let path = PathBuf::from("/watch/a.jpg");

        registry
            .dispatch(
                &[descriptor("a"), descriptor("c")],
                &invocation(&path),
            )
            .await;

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:begin", "a:end", "c:begin", "c:end"]
        );
    }

    #[tokio::test]
    async fn a_failing_action_does_not_stop_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = recording_registry(&log);
        let path = PathBuf::from("/watch/a.jpg");

        registry
            .dispatch(
                &[descriptor("a"), descriptor("b"), descriptor("c")],
                &invocation(&path),
            )
            .await;

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:begin", "a:end", "b:begin", "b:end", "c:begin", "c:end"]
        );
    }

    #[tokio::test]
    async fn unknown_modules_are_skipped_at_dispatch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = recording_registry(&log);
        let path = PathBuf::from("/watch/a.jpg");

        registry
            .dispatch(
                &[descriptor("missing"), descriptor("a")],
                &invocation(&path),
            )
            .await;

        assert_eq!(*log.lock().unwrap(), vec!["a:begin", "a:end"]);
    }

    #[test]
    fn verify_rejects_unknown_modules() {
        let registry = ActionRegistry::builtin();
        assert!(registry.verify(&[descriptor("delete"), descriptor("mqtt")]).is_ok());
        assert!(registry.verify(&[descriptor("teleport")]).is_err());
    }
}
