use serde_json::Value;

use crate::errors::RuntimeError;
use crate::event::{CallEvent, Decision, InvocationOutcome};
use crate::history::{HistoryRecord, HistoryStore, RetentionPolicy};
use crate::runtime::{DecisionRuntime, Registration};

/// The no-op end of the decision spectrum: every call is allowed, nothing is
/// reported or halted, but the per-root history is still seeded and threaded
/// so a later swap to a reasoning runtime starts with full context.
#[derive(Debug, Default)]
pub struct PassthroughRuntime {
    store: HistoryStore,
}

impl PassthroughRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: RetentionPolicy) -> Self {
        Self { store: HistoryStore::with_retention(retention) }
    }
}

impl DecisionRuntime for PassthroughRuntime {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn register(&self, registration: Registration) -> Result<(), RuntimeError> {
        self.store.register(&registration)
    }

    fn decide(&self, root_label: &str, event: &CallEvent) -> Result<Decision, RuntimeError> {
        let decision = Decision::allow();
        self.store.append(root_label, HistoryRecord::decided(event.clone(), decision))?;
        Ok(decision)
    }

    fn acknowledge(&self, root_label: &str, event: &CallEvent, outcome: &InvocationOutcome) {
        if let Err(error) =
            self.store.append(root_label, HistoryRecord::completed(outcome.clone()))
        {
            tracing::warn!(
                runtime = self.name(),
                call_site = %event.call_site,
                %error,
                "failed to record call outcome"
            );
        }
    }

    fn produce_replacement(
        &self,
        _root_label: &str,
        event: &CallEvent,
        _schema: Option<&str>,
        _example: Option<&Value>,
    ) -> Result<Value, RuntimeError> {
        // This runtime never intercepts, so there is nothing to substitute.
        Err(RuntimeError::ReplacementUnavailable(event.call_site.clone()))
    }

    fn history(&self, root_label: &str) -> Vec<HistoryRecord> {
        self.store.snapshot(root_label)
    }
}
