use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use overseer_agent::{FileReportSink, HttpLlmClient, ModelRuntime};
use overseer_core::config::AppConfig;
use overseer_core::errors::ProbeError;
use overseer_core::probe::{wrap_with, Probe, ProbeConfig};
use overseer_core::runtime::rules::{CallSiteMatcher, DecisionRule, RuleRuntime};
use overseer_core::runtime::{passthrough::PassthroughRuntime, DecisionRuntime};
use overseer_core::subject::builtin::ListSubject;

use crate::commands::CommandResult;
use crate::halt::StdinHaltHook;
use crate::RuntimeKind;

const OPERATOR_NOTES_FILE: &str = "operator_notes.md";

/// Wraps a three-element list and runs the canonical supervised sequence:
/// three appends, a length query, and a final render.
pub fn run(
    config: &AppConfig,
    kind: RuntimeKind,
    intent: &str,
    report: Option<&Path>,
    pause: bool,
) -> CommandResult {
    let runtime: Arc<dyn DecisionRuntime> = match kind {
        RuntimeKind::Passthrough => {
            Arc::new(PassthroughRuntime::with_retention(config.history.retention()))
        }
        RuntimeKind::Rules => Arc::new(
            RuleRuntime::new(vec![DecisionRule::intercept(
                CallSiteMatcher::Suffix(".append".to_owned()),
                json!("rejected"),
            )
            .on_nth(2)
            .reporting()])
            .with_retention(config.history.retention()),
        ),
        RuntimeKind::Model => {
            let client = match HttpLlmClient::new(&config.llm) {
                Ok(client) => client,
                Err(error) => {
                    return CommandResult::failure("demo", "llm_client", error.to_string(), 2)
                }
            };
            Arc::new(
                ModelRuntime::with_retention(client, config.history.retention())
                    .with_notes_path(OPERATOR_NOTES_FILE),
            )
        }
    };

    let mut probe_config = ProbeConfig::default();
    if let Some(path) = report.or(config.report.path.as_deref()) {
        probe_config.report_sink = Arc::new(FileReportSink::new(path));
    }
    if pause {
        probe_config.halt_hook = Arc::new(StdinHaltHook);
    }

    match scenario(intent, runtime.clone(), probe_config) {
        Ok(summary) => CommandResult::success("demo", summary),
        Err(error) => CommandResult::failure("demo", error_class(&error), error.to_string(), 1),
    }
}

fn scenario(
    intent: &str,
    runtime: Arc<dyn DecisionRuntime>,
    probe_config: ProbeConfig,
) -> Result<String, ProbeError> {
    let subject = ListSubject::from_values(vec![json!(1), json!(2), json!(3)]);
    let list = wrap_with(subject, intent, runtime.clone(), probe_config)?;

    for value in [4, 5, 6] {
        append(&list, json!(value))?;
    }
    let length = list.len()?;
    let rendered = list.text()?;

    let records = runtime.history(list.root_label()).len();
    Ok(format!(
        "root {}; final state {}; length {length}; history records {records}",
        list.root_label(),
        rendered,
    ))
}

fn append(list: &Probe, value: serde_json::Value) -> Result<serde_json::Value, ProbeError> {
    list.get("append")?.into_member()?.call(vec![value], BTreeMap::new())
}

fn error_class(error: &ProbeError) -> &'static str {
    match error {
        ProbeError::Runtime(_) => "runtime",
        ProbeError::Subject(_) => "subject",
        _ => "probe",
    }
}
