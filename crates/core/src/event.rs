use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// One intercepted invocation, as presented to the decision runtime.
///
/// `kwargs` is a `BTreeMap` so the serialized form has stable key ordering;
/// the same call always hashes and logs identically.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallEvent {
    pub call_site: String,
    pub args: Vec<Value>,
    pub kwargs: BTreeMap<String, Value>,
}

impl CallEvent {
    pub fn new(call_site: impl Into<String>, args: Vec<Value>, kwargs: BTreeMap<String, Value>) -> Self {
        Self { call_site: call_site.into(), args, kwargs }
    }

    /// Canonical text form used for prompts, reports, and digests.
    pub fn canonical_text(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| {
            format!("{{\"call_site\": \"{}\"}}", self.call_site.replace('"', "\\\""))
        })
    }

    /// Hex sha-256 of the canonical text.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_text().as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

/// Outcome of one decision step. The three facets are orthogonal: a call may
/// be reported and still executed, or intercepted without being reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub intercept: bool,
    pub report: bool,
    pub halt: bool,
}

impl Decision {
    pub fn allow() -> Self {
        Self::default()
    }

    pub fn intercept() -> Self {
        Self { intercept: true, report: false, halt: false }
    }

    pub fn with_report(mut self) -> Self {
        self.report = true;
        self
    }

    pub fn with_halt(mut self) -> Self {
        self.halt = true;
        self
    }

    /// Short form used in history transcripts and log fields.
    pub fn summary(&self) -> String {
        format!(
            "{}, {}, {}",
            if self.intercept { "intercept" } else { "not intercept" },
            if self.report { "reported" } else { "not reported" },
            if self.halt { "halted" } else { "not halted" },
        )
    }
}

/// What actually happened on the not-intercepted path. A failed real call is
/// still recorded before the error propagates to the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationOutcome {
    Returned(Value),
    Failed(String),
}

impl InvocationOutcome {
    pub fn render(&self) -> String {
        match self {
            Self::Returned(value) => value.to_string(),
            Self::Failed(message) => format!("error: {message}"),
        }
    }
}
