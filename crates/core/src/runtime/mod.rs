pub mod passthrough;
pub mod rules;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::RuntimeError;
use crate::event::{CallEvent, Decision, InvocationOutcome};
use crate::history::HistoryRecord;

/// Seed data for a freshly wrapped root: everything the decision authority
/// learns about the object before its first event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub root_label: String,
    pub type_name: String,
    pub initial_state: String,
    pub intent: String,
}

/// The decision protocol. A runtime owns all history state and mediates
/// every interception decision; the probe only ever talks to this contract,
/// so a no-op runtime, a deterministic rule runtime, and an LLM-backed
/// runtime are interchangeable.
///
/// `decide` must append its decision record before returning and must not
/// mutate the wrapped target. Failures out of `decide` and
/// `produce_replacement` are fatal to the specific invocation and are never
/// defaulted or retried: a retry could double-charge a side-effecting call,
/// and a silent default would change program behavior unpredictably.
pub trait DecisionRuntime: Send + Sync {
    /// Short identifier used in log fields and probe internals.
    fn name(&self) -> &'static str;

    /// Opens the history for a new root. Re-registration is a programmer
    /// error and fails.
    fn register(&self, registration: Registration) -> Result<(), RuntimeError>;

    /// Turns one event into a decision, appending the decision record.
    fn decide(&self, root_label: &str, event: &CallEvent) -> Result<Decision, RuntimeError>;

    /// Records the outcome of a not-intercepted call. Must never fail the
    /// caller's flow; internal logging errors are logged and swallowed.
    fn acknowledge(&self, root_label: &str, event: &CallEvent, outcome: &InvocationOutcome);

    /// Produces the substitute result for an intercepted call, appending the
    /// replacement record. `schema` is the callable's doc text when one
    /// exists; `example` is the best-effort sampled real result, when the
    /// subject allowed sampling.
    fn produce_replacement(
        &self,
        root_label: &str,
        event: &CallEvent,
        schema: Option<&str>,
        example: Option<&Value>,
    ) -> Result<Value, RuntimeError>;

    /// Ordered point-in-time copy of a root's history records.
    fn history(&self, root_label: &str) -> Vec<HistoryRecord>;
}
