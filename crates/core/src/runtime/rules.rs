use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::RuntimeError;
use crate::event::{CallEvent, Decision, InvocationOutcome};
use crate::history::{HistoryRecord, HistoryStore, RetentionPolicy};
use crate::runtime::{DecisionRuntime, Registration};

/// Matches a rule against an event's call site.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallSiteMatcher {
    Any,
    Exact(String),
    /// Matches on the dotted tail, e.g. `.append` hits every root's append.
    Suffix(String),
}

impl CallSiteMatcher {
    fn matches(&self, call_site: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(site) => call_site == site,
            Self::Suffix(suffix) => call_site.ends_with(suffix.as_str()),
        }
    }
}

/// One deterministic policy line. `nth` restricts the rule to the n-th time
/// its matcher hits for a given root (1-based); `replacement` is the canned
/// value handed back when the decision intercepts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionRule {
    pub matcher: CallSiteMatcher,
    #[serde(default)]
    pub nth: Option<usize>,
    pub decision: Decision,
    #[serde(default)]
    pub replacement: Option<Value>,
}

impl DecisionRule {
    pub fn allow(matcher: CallSiteMatcher) -> Self {
        Self { matcher, nth: None, decision: Decision::allow(), replacement: None }
    }

    pub fn intercept(matcher: CallSiteMatcher, replacement: Value) -> Self {
        Self { matcher, nth: None, decision: Decision::intercept(), replacement: Some(replacement) }
    }

    pub fn on_nth(mut self, nth: usize) -> Self {
        self.nth = Some(nth);
        self
    }

    pub fn reporting(mut self) -> Self {
        self.decision.report = true;
        self
    }

    pub fn halting(mut self) -> Self {
        self.decision.halt = true;
        self
    }
}

/// The deterministic rule-based runtime: first applicable rule wins, default
/// allow. Replacements are staged at decide time and consumed by
/// `produce_replacement`, so occurrence counters never advance twice for one
/// event.
#[derive(Debug, Default)]
pub struct RuleRuntime {
    rules: Vec<DecisionRule>,
    store: HistoryStore,
    hits: Mutex<HashMap<(String, usize), usize>>,
    staged: Mutex<HashMap<String, Option<Value>>>,
}

impl RuleRuntime {
    pub fn new(rules: Vec<DecisionRule>) -> Self {
        Self { rules, ..Self::default() }
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.store = HistoryStore::with_retention(retention);
        self
    }

    fn evaluate(&self, root_label: &str, call_site: &str) -> (Decision, Option<Option<Value>>) {
        let mut hits = match self.hits.lock() {
            Ok(hits) => hits,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut applied: Option<&DecisionRule> = None;
        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.matcher.matches(call_site) {
                continue;
            }
            // Counters advance for every matching rule so later `nth`
            // filters stay meaningful even when an earlier rule fires first.
            let count = hits.entry((root_label.to_owned(), index)).or_insert(0);
            *count += 1;
            let applies = rule.nth.map_or(true, |nth| nth == *count);
            if applies && applied.is_none() {
                applied = Some(rule);
            }
        }

        match applied {
            Some(rule) if rule.decision.intercept => {
                (rule.decision, Some(rule.replacement.clone()))
            }
            Some(rule) => (rule.decision, None),
            None => (Decision::allow(), None),
        }
    }
}

impl DecisionRuntime for RuleRuntime {
    fn name(&self) -> &'static str {
        "rules"
    }

    fn register(&self, registration: Registration) -> Result<(), RuntimeError> {
        self.store.register(&registration)
    }

    fn decide(&self, root_label: &str, event: &CallEvent) -> Result<Decision, RuntimeError> {
        let (decision, staged) = self.evaluate(root_label, &event.call_site);
        self.store.append(root_label, HistoryRecord::decided(event.clone(), decision))?;
        if let Some(replacement) = staged {
            match self.staged.lock() {
                Ok(mut stage) => {
                    stage.insert(root_label.to_owned(), replacement);
                }
                Err(poisoned) => {
                    poisoned.into_inner().insert(root_label.to_owned(), replacement);
                }
            }
        }
        tracing::debug!(
            runtime = self.name(),
            call_site = %event.call_site,
            intercept = decision.intercept,
            report = decision.report,
            halt = decision.halt,
            "rule decision"
        );
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
        root_label: &str,
        event: &CallEvent,
        _schema: Option<&str>,
        _example: Option<&Value>,
    ) -> Result<Value, RuntimeError> {
        let staged = match self.staged.lock() {
            Ok(mut stage) => stage.remove(root_label),
            Err(poisoned) => poisoned.into_inner().remove(root_label),
        };
        let Some(Some(replacement)) = staged else {
            return Err(RuntimeError::ReplacementUnavailable(event.call_site.clone()));
        };
        self.store.append(root_label, HistoryRecord::replaced(replacement.clone()))?;
        Ok(replacement)
    }

    fn history(&self, root_label: &str) -> Vec<HistoryRecord> {
        self.store.snapshot(root_label)
    }
}
