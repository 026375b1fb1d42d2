use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use overseer_core::errors::RuntimeError;
use overseer_core::event::{CallEvent, Decision, InvocationOutcome};
use overseer_core::history::{HistoryRecord, HistoryStore, RetentionPolicy};
use overseer_core::runtime::{DecisionRuntime, Registration};

use crate::llm::LlmClient;
use crate::prompts;

/// Decision authority backed by a language model. Each decision sends the
/// root's full transcript plus the pending event to the model and expects a
/// strict JSON verdict back.
pub struct ModelRuntime<C: LlmClient> {
    client: C,
    store: HistoryStore,
    notes_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelVerdict {
    #[serde(default)]
    should_intercept: bool,
    #[serde(default)]
    should_report: bool,
    #[serde(default)]
    should_halt: bool,
}

impl<C: LlmClient> ModelRuntime<C> {
    pub fn new(client: C) -> Self {
        Self { client, store: HistoryStore::new(), notes_path: None }
    }

    pub fn with_retention(client: C, retention: RetentionPolicy) -> Self {
        Self { client, store: HistoryStore::with_retention(retention), notes_path: None }
    }

    /// File of standing operator instructions, re-read before every model
    /// call so edits take effect mid-run. A missing file reads as empty.
    pub fn with_notes_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.notes_path = Some(path.into());
        self
    }

    fn operator_notes(&self) -> String {
        let Some(path) = &self.notes_path else {
            return String::new();
        };
        fs::read_to_string(path).unwrap_or_default()
    }
}

impl<C: LlmClient> DecisionRuntime for ModelRuntime<C> {
    fn name(&self) -> &'static str {
        "model"
    }

    fn register(&self, registration: Registration) -> Result<(), RuntimeError> {
        debug!(root = %registration.root_label, "registering root with model runtime");
        self.store.register(&registration)
    }

    fn decide(&self, root_label: &str, event: &CallEvent) -> Result<Decision, RuntimeError> {
        let transcript = self.store.transcript(root_label)?;
        let prompt =
            prompts::decision_prompt(&transcript, &event.canonical_text(), &self.operator_notes());

        let reply = self
            .client
            .complete(&prompt)
            .map_err(|err| RuntimeError::DecisionUnavailable(err.to_string()))?;
        let verdict: ModelVerdict = serde_json::from_str(json_payload(&reply))
            .map_err(|err| RuntimeError::Decoding(format!("verdict `{reply}`: {err}")))?;

        let decision = Decision {
            intercept: verdict.should_intercept,
            report: verdict.should_report,
            halt: verdict.should_halt,
        };
        debug!(root = root_label, summary = %decision.summary(), "model verdict");
        self.store.append(root_label, HistoryRecord::decided(event.clone(), decision))?;
        Ok(decision)
    }

    fn acknowledge(&self, root_label: &str, event: &CallEvent, outcome: &InvocationOutcome) {
        let transcript = match self.store.transcript(root_label) {
            Ok(transcript) => transcript,
            Err(err) => {
                warn!(root = root_label, error = %err, "acknowledge on unknown root");
                return;
            }
        };

        // The model is told the result so its picture of the object stays
        // current, but its reply carries no information and any failure here
        // must not disturb the caller.
        let prompt = prompts::acknowledge_prompt(
            &transcript,
            &event.canonical_text(),
            &outcome.render(),
            &self.operator_notes(),
        );
        if let Err(err) = self.client.complete(&prompt) {
            warn!(root = root_label, error = %err, "acknowledge call failed");
        }

        if let Err(err) = self.store.append(root_label, HistoryRecord::completed(outcome.clone())) {
            warn!(root = root_label, error = %err, "could not record outcome");
        }
    }

    fn produce_replacement(
        &self,
        root_label: &str,
        event: &CallEvent,
        schema: Option<&str>,
        example: Option<&Value>,
    ) -> Result<Value, RuntimeError> {
        let transcript = self.store.transcript(root_label)?;
        let example_text = example.map(|value| value.to_string());
        let prompt = prompts::replacement_prompt(
            &transcript,
            &event.canonical_text(),
            schema,
            example_text.as_deref(),
            &self.operator_notes(),
        );

        let reply = self
            .client
            .complete(&prompt)
            .map_err(|err| RuntimeError::ReplacementUnavailable(err.to_string()))?;
        let value: Value = serde_json::from_str(json_payload(&reply))
            .map_err(|err| RuntimeError::Decoding(format!("replacement `{reply}`: {err}")))?;

        self.store.append(root_label, HistoryRecord::replaced(value.clone()))?;
        Ok(value)
    }

    fn history(&self, root_label: &str) -> Vec<HistoryRecord> {
        self.store.snapshot(root_label)
    }
}

/// Models wrap JSON in markdown fences often enough that stripping them is
/// part of the decode path, not error handling.
fn json_payload(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::Write;
    use std::sync::Mutex;

    use serde_json::json;

    use overseer_core::event::{CallEvent, InvocationOutcome};
    use overseer_core::history::HistoryRecord;
    use overseer_core::runtime::{DecisionRuntime, Registration};

    use super::{json_payload, ModelRuntime};
    use crate::llm::{LlmClient, LlmError};

    struct FakeLlmClient {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeLlmClient {
        fn scripted(replies: Vec<Result<String, LlmError>>) -> Self {
            Self { replies: Mutex::new(replies.into()), prompts: Mutex::new(Vec::new()) }
        }
    }

    impl LlmClient for FakeLlmClient {
        fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().expect("prompt log").push(prompt.to_owned());
            self.replies
                .lock()
                .expect("scripted replies")
                .pop_front()
                .unwrap_or(Ok("{}".to_owned()))
        }
    }

    fn registration() -> Registration {
        Registration {
            root_label: "List_0badc0de".to_owned(),
            type_name: "List".to_owned(),
            initial_state: "[]".to_owned(),
            intent: "watch the list".to_owned(),
        }
    }

    fn event() -> CallEvent {
        CallEvent::new("List_0badc0de.append", vec![json!(4)], Default::default())
    }

    #[test]
    fn verdict_json_maps_onto_decision() {
        let client = FakeLlmClient::scripted(vec![Ok(
            r#"{"should_intercept": true, "should_report": true, "should_halt": false}"#.to_owned(),
        )]);
        let runtime = ModelRuntime::new(client);
        runtime.register(registration()).expect("register");

        let decision = runtime.decide("List_0badc0de", &event()).expect("decide");
        assert!(decision.intercept);
        assert!(decision.report);
        assert!(!decision.halt);
        assert_eq!(
            runtime
                .history("List_0badc0de")
                .iter()
                .filter(|record| matches!(record, HistoryRecord::Decided { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn missing_verdict_keys_default_to_false() {
        let client = FakeLlmClient::scripted(vec![Ok("{}".to_owned())]);
        let runtime = ModelRuntime::new(client);
        runtime.register(registration()).expect("register");

        let decision = runtime.decide("List_0badc0de", &event()).expect("decide");
        assert!(!decision.intercept && !decision.report && !decision.halt);
    }

    #[test]
    fn fenced_verdicts_still_decode() {
        let client = FakeLlmClient::scripted(vec![Ok(
            "```json\n{\"should_halt\": true}\n```".to_owned()
        )]);
        let runtime = ModelRuntime::new(client);
        runtime.register(registration()).expect("register");

        let decision = runtime.decide("List_0badc0de", &event()).expect("decide");
        assert!(decision.halt);
    }

    #[test]
    fn garbage_verdict_is_a_decoding_error() {
        let client = FakeLlmClient::scripted(vec![Ok("definitely not json".to_owned())]);
        let runtime = ModelRuntime::new(client);
        runtime.register(registration()).expect("register");

        let error = runtime.decide("List_0badc0de", &event()).expect_err("should fail");
        assert!(error.to_string().contains("definitely not json"));
    }

    #[test]
    fn transport_failure_leaves_no_decision_record() {
        let client =
            FakeLlmClient::scripted(vec![Err(LlmError::Transport("connection refused".to_owned()))]);
        let runtime = ModelRuntime::new(client);
        runtime.register(registration()).expect("register");

        runtime.decide("List_0badc0de", &event()).expect_err("should fail");
        assert_eq!(runtime.history("List_0badc0de").len(), 1);
    }

    #[test]
    fn replacement_parses_model_value_and_records_it() {
        let client = FakeLlmClient::scripted(vec![Ok("\"rejected\"".to_owned())]);
        let runtime = ModelRuntime::new(client);
        runtime.register(registration()).expect("register");

        let value = runtime
            .produce_replacement("List_0badc0de", &event(), Some("a string"), None)
            .expect("replacement");
        assert_eq!(value, json!("rejected"));
        assert!(runtime
            .history("List_0badc0de")
            .iter()
            .any(|record| matches!(record, HistoryRecord::Replaced { .. })));
    }

    #[test]
    fn acknowledge_survives_llm_failure_and_still_records_outcome() {
        let client = FakeLlmClient::scripted(vec![Err(LlmError::EmptyResponse)]);
        let runtime = ModelRuntime::new(client);
        runtime.register(registration()).expect("register");

        runtime.acknowledge(
            "List_0badc0de",
            &event(),
            &InvocationOutcome::Returned(json!(null)),
        );
        assert!(runtime
            .history("List_0badc0de")
            .iter()
            .any(|record| matches!(record, HistoryRecord::Completed { .. })));
    }

    #[test]
    fn later_prompts_carry_earlier_events() {
        let client = FakeLlmClient::scripted(vec![Ok("{}".to_owned()), Ok("{}".to_owned())]);
        let runtime = ModelRuntime::new(client);
        runtime.register(registration()).expect("register");

        runtime.decide("List_0badc0de", &event()).expect("first decide");
        runtime.decide("List_0badc0de", &event()).expect("second decide");

        let prompts = runtime.client.prompts.lock().expect("prompt log");
        assert!(prompts[0].contains("initial state"));
        assert!(prompts[1].contains("You decided to"));
    }

    #[test]
    fn operator_notes_are_reread_per_decision() {
        let mut notes = tempfile::NamedTempFile::new().expect("notes file");
        writeln!(notes, "always report appends").expect("write notes");

        let client = FakeLlmClient::scripted(vec![Ok("{}".to_owned())]);
        let runtime = ModelRuntime::new(client).with_notes_path(notes.path());
        runtime.register(registration()).expect("register");
        runtime.decide("List_0badc0de", &event()).expect("decide");

        let prompts = runtime.client.prompts.lock().expect("prompt log");
        assert!(prompts[0].contains("always report appends"));
    }

    #[test]
    fn fence_stripping_handles_plain_and_fenced_payloads() {
        assert_eq!(json_payload("{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(json_payload("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(json_payload("```\n[1, 2]\n```"), "[1, 2]");
    }
}
