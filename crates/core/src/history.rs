use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::RuntimeError;
use crate::event::{CallEvent, Decision, InvocationOutcome};
use crate::runtime::Registration;

/// One entry in a root's history. Records are only ever appended; the
/// transcript of past records is the sole memory the decision authority has
/// of an object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryRecord {
    Registered {
        at: DateTime<Utc>,
        type_name: String,
        initial_state: String,
        intent: String,
    },
    Decided {
        at: DateTime<Utc>,
        event: CallEvent,
        decision: Decision,
    },
    Completed {
        at: DateTime<Utc>,
        outcome: InvocationOutcome,
    },
    Replaced {
        at: DateTime<Utc>,
        value: Value,
    },
}

impl HistoryRecord {
    pub fn registered(registration: &Registration) -> Self {
        Self::Registered {
            at: Utc::now(),
            type_name: registration.type_name.clone(),
            initial_state: registration.initial_state.clone(),
            intent: registration.intent.clone(),
        }
    }

    pub fn decided(event: CallEvent, decision: Decision) -> Self {
        Self::Decided { at: Utc::now(), event, decision }
    }

    pub fn completed(outcome: InvocationOutcome) -> Self {
        Self::Completed { at: Utc::now(), outcome }
    }

    pub fn replaced(value: Value) -> Self {
        Self::Replaced { at: Utc::now(), value }
    }

    fn transcript_line(&self) -> String {
        match self {
            Self::Registered { type_name, initial_state, intent, .. } => format!(
                "The object has type {type_name} and initial state {initial_state}.\n\
                 The user instruction is: {intent}"
            ),
            Self::Decided { event, decision, .. } => format!(
                "An event happened on the object:\n{}\nYou decided to: {}.",
                event.canonical_text(),
                decision.summary()
            ),
            Self::Completed { outcome, .. } => {
                format!("The result of the event was: {}", outcome.render())
            }
            Self::Replaced { value, .. } => {
                format!("The response you provided instead was: {value}")
            }
        }
    }
}

/// Append-only record sequence for one root.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    records: Vec<HistoryRecord>,
}

impl History {
    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of invocations decided so far; each `Invoke` contributes
    /// exactly one `Decided` record regardless of branch.
    pub fn invocation_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| matches!(record, HistoryRecord::Decided { .. }))
            .count()
    }

    /// Plain-text rendering of the full ordered history, in the shape the
    /// decision prompts expect.
    pub fn transcript(&self) -> String {
        self.records
            .iter()
            .map(HistoryRecord::transcript_line)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Retention for long-lived processes. By default history grows without
/// bound. A cap evicts the oldest records but never the registration seed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RetentionPolicy {
    #[default]
    Unbounded,
    CapRecords(usize),
}

/// All history state, keyed by the root's stable string label rather than by
/// object identity. Access to a given root's records is serialized behind
/// the store lock, which is what makes records strictly ordered by the
/// sequence of invocations the runtime observed.
#[derive(Debug, Default)]
pub struct HistoryStore {
    retention: RetentionPolicy,
    roots: Mutex<HashMap<String, History>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: RetentionPolicy) -> Self {
        Self { retention, roots: Mutex::new(HashMap::new()) }
    }

    pub fn register(&self, registration: &Registration) -> Result<(), RuntimeError> {
        let mut roots = self.lock_roots();
        if roots.contains_key(&registration.root_label) {
            return Err(RuntimeError::AlreadyRegistered(registration.root_label.clone()));
        }
        let history = History { records: vec![HistoryRecord::registered(registration)] };
        roots.insert(registration.root_label.clone(), history);
        Ok(())
    }

    pub fn is_registered(&self, root_label: &str) -> bool {
        self.lock_roots().contains_key(root_label)
    }

    pub fn append(&self, root_label: &str, record: HistoryRecord) -> Result<(), RuntimeError> {
        let mut roots = self.lock_roots();
        let history = roots
            .get_mut(root_label)
            .ok_or_else(|| RuntimeError::Unregistered(root_label.to_owned()))?;
        history.records.push(record);

        if let RetentionPolicy::CapRecords(cap) = self.retention {
            while history.records.len() > cap.max(1) {
                let Some(evict_at) = history
                    .records
                    .iter()
                    .position(|record| !matches!(record, HistoryRecord::Registered { .. }))
                else {
                    break;
                };
                history.records.remove(evict_at);
            }
        }
        Ok(())
    }

    pub fn transcript(&self, root_label: &str) -> Result<String, RuntimeError> {
        let roots = self.lock_roots();
        roots
            .get(root_label)
            .map(History::transcript)
            .ok_or_else(|| RuntimeError::Unregistered(root_label.to_owned()))
    }

    /// Point-in-time copy of a root's history; empty for unknown roots.
    pub fn snapshot(&self, root_label: &str) -> Vec<HistoryRecord> {
        self.lock_roots().get(root_label).map(|history| history.records.clone()).unwrap_or_default()
    }

    fn lock_roots(&self) -> std::sync::MutexGuard<'_, HashMap<String, History>> {
        match self.roots.lock() {
            Ok(roots) => roots,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{HistoryRecord, HistoryStore, RetentionPolicy};
    use crate::errors::RuntimeError;
    use crate::event::{CallEvent, Decision, InvocationOutcome};
    use crate::runtime::Registration;

    fn registration(label: &str) -> Registration {
        Registration {
            root_label: label.to_owned(),
            type_name: "List".to_owned(),
            initial_state: "[]".to_owned(),
            intent: "track appends".to_owned(),
        }
    }

    fn append_event(label: &str, value: i64) -> CallEvent {
        CallEvent::new(format!("{label}.append"), vec![json!(value)], Default::default())
    }

    #[test]
    fn register_twice_fails_with_already_registered() {
        let store = HistoryStore::new();
        store.register(&registration("List_1")).expect("first registration");
        let error = store.register(&registration("List_1")).expect_err("second registration");
        assert_eq!(error, RuntimeError::AlreadyRegistered("List_1".to_owned()));
    }

    #[test]
    fn append_to_unknown_root_is_rejected() {
        let store = HistoryStore::new();
        let record = HistoryRecord::completed(InvocationOutcome::Returned(json!(null)));
        assert_eq!(
            store.append("List_missing", record),
            Err(RuntimeError::Unregistered("List_missing".to_owned()))
        );
    }

    #[test]
    fn later_snapshots_extend_earlier_ones_without_rewriting() {
        let store = HistoryStore::new();
        store.register(&registration("List_1")).expect("register");

        store
            .append("List_1", HistoryRecord::decided(append_event("List_1", 4), Decision::allow()))
            .expect("decided");
        let earlier = store.snapshot("List_1");

        store
            .append(
                "List_1",
                HistoryRecord::completed(InvocationOutcome::Returned(json!(null))),
            )
            .expect("completed");
        let later = store.snapshot("List_1");

        assert!(later.len() > earlier.len());
        assert_eq!(&later[..earlier.len()], earlier.as_slice());
    }

    #[test]
    fn transcript_threads_registration_decisions_and_results() {
        let store = HistoryStore::new();
        store.register(&registration("List_1")).expect("register");
        store
            .append(
                "List_1",
                HistoryRecord::decided(append_event("List_1", 4), Decision::intercept()),
            )
            .expect("decided");
        store.append("List_1", HistoryRecord::replaced(json!("rejected"))).expect("replaced");

        let transcript = store.transcript("List_1").expect("transcript");
        assert!(transcript.contains("has type List"));
        assert!(transcript.contains("track appends"));
        assert!(transcript.contains("List_1.append"));
        assert!(transcript.contains("intercept, not reported, not halted"));
        assert!(transcript.contains("\"rejected\""));
    }

    #[test]
    fn capped_retention_evicts_oldest_but_keeps_the_seed() {
        let store = HistoryStore::with_retention(RetentionPolicy::CapRecords(3));
        store.register(&registration("List_1")).expect("register");
        for value in 0..4 {
            store
                .append(
                    "List_1",
                    HistoryRecord::decided(append_event("List_1", value), Decision::allow()),
                )
                .expect("decided");
        }

        let records = store.snapshot("List_1");
        assert_eq!(records.len(), 3);
        assert!(matches!(records[0], HistoryRecord::Registered { .. }));
        assert!(
            matches!(&records[2], HistoryRecord::Decided { event, .. } if event.args == vec![json!(3)])
        );
    }
}
