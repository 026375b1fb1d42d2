use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use serde_json::Value;
use uuid::Uuid;

use crate::errors::ProbeError;
use crate::event::{CallEvent, InvocationOutcome};
use crate::halt::{HaltHook, NoopHaltHook};
use crate::report::{NoopReportSink, ReportRecord, ReportSink};
use crate::runtime::{DecisionRuntime, Registration};
use crate::subject::{MemberSpec, Subject};

/// Names that address the probe's own bookkeeping. A member access with one
/// of these names never reaches the wrapped object.
pub const RESERVED_FIELDS: &[&str] = &["target", "intent", "path", "root", "runtime"];

/// Collaborators a root probe carries besides its decision runtime. Defaults
/// discard reports and resume halts immediately.
#[derive(Clone)]
pub struct ProbeConfig {
    pub report_sink: Arc<dyn ReportSink>,
    pub halt_hook: Arc<dyn HaltHook>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { report_sink: Arc::new(NoopReportSink), halt_hook: Arc::new(NoopHaltHook) }
    }
}

struct RootState {
    label: String,
    subject: Mutex<Box<dyn Subject>>,
    intent: RwLock<String>,
    runtime: Arc<dyn DecisionRuntime>,
    report_sink: Arc<dyn ReportSink>,
    halt_hook: Arc<dyn HaltHook>,
}

/// Result of a member access: either the probe's own internal state (for
/// reserved names) or a lazily created child probe over the subject's member.
#[derive(Clone, Debug)]
pub enum Attr {
    Internal { field: String, value: Value },
    Member(Probe),
}

impl Attr {
    pub fn into_member(self) -> Result<Probe, ProbeError> {
        match self {
            Self::Member(probe) => Ok(probe),
            Self::Internal { field, .. } => Err(ProbeError::ReservedField(field)),
        }
    }
}

/// A supervised reference. The caller programs against the probe exactly as
/// against the real value; invocations are routed through the decision
/// runtime, member accesses create child probes sharing this root, item and
/// member writes pass straight through.
#[derive(Clone)]
pub struct Probe {
    root: Arc<RootState>,
    rel_path: Vec<String>,
    label: String,
    member: Option<MemberSpec>,
}

/// Anything `wrap` accepts: a fresh subject, or an existing probe. Wrapping
/// a probe again is idempotent: it keeps the existing root and does not
/// re-register.
pub trait IntoProbe {
    fn into_probe(
        self,
        intent: &str,
        runtime: Arc<dyn DecisionRuntime>,
        config: ProbeConfig,
    ) -> Result<Probe, ProbeError>;
}

impl<S: Subject + 'static> IntoProbe for S {
    fn into_probe(
        self,
        intent: &str,
        runtime: Arc<dyn DecisionRuntime>,
        config: ProbeConfig,
    ) -> Result<Probe, ProbeError> {
        Probe::new_root(Box::new(self), intent, runtime, config)
    }
}

impl IntoProbe for Probe {
    fn into_probe(
        self,
        _intent: &str,
        _runtime: Arc<dyn DecisionRuntime>,
        _config: ProbeConfig,
    ) -> Result<Probe, ProbeError> {
        Ok(self)
    }
}

/// The single entry point: wrap a value under an intent and hand supervision
/// to `runtime`.
pub fn wrap<T: IntoProbe>(
    value: T,
    intent: &str,
    runtime: Arc<dyn DecisionRuntime>,
) -> Result<Probe, ProbeError> {
    value.into_probe(intent, runtime, ProbeConfig::default())
}

/// `wrap` with explicit report sink and halt hook collaborators.
pub fn wrap_with<T: IntoProbe>(
    value: T,
    intent: &str,
    runtime: Arc<dyn DecisionRuntime>,
    config: ProbeConfig,
) -> Result<Probe, ProbeError> {
    value.into_probe(intent, runtime, config)
}

impl Probe {
    fn new_root(
        subject: Box<dyn Subject>,
        intent: &str,
        runtime: Arc<dyn DecisionRuntime>,
        config: ProbeConfig,
    ) -> Result<Self, ProbeError> {
        let label = format!("{}_{}", subject.type_name(), short_id());
        let registration = Registration {
            root_label: label.clone(),
            type_name: subject.type_name().to_owned(),
            initial_state: subject.render(),
            intent: intent.to_owned(),
        };
        // A failed registration is a programmer error; nothing is wrapped.
        runtime.register(registration)?;

        tracing::debug!(root = %label, runtime = runtime.name(), "probe registered");

        let root = Arc::new(RootState {
            label: label.clone(),
            subject: Mutex::new(subject),
            intent: RwLock::new(intent.to_owned()),
            runtime,
            report_sink: config.report_sink,
            halt_hook: config.halt_hook,
        });
        Ok(Self { root, rel_path: Vec::new(), label, member: None })
    }

    /// This node's dotted position relative to its root.
    pub fn path_label(&self) -> &str {
        &self.label
    }

    pub fn root_label(&self) -> &str {
        &self.root.label
    }

    pub fn is_root(&self) -> bool {
        self.rel_path.is_empty()
    }

    pub fn intent(&self) -> String {
        match self.root.intent.read() {
            Ok(intent) => intent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Live value at this node: the whole object at the root, the member's
    /// current data value below it (`Null` for callables).
    pub fn snapshot(&self) -> Value {
        let subject = self.lock_subject();
        if self.rel_path.is_empty() {
            subject.snapshot()
        } else {
            subject.peek(&self.rel_path).unwrap_or(Value::Null)
        }
    }

    /// Member access. Reserved names answer from the probe's own state and
    /// never touch the subject; anything else resolves against the subject
    /// and wraps the member in a child probe. Not an event: the runtime is
    /// not consulted and history does not grow.
    pub fn get(&self, name: &str) -> Result<Attr, ProbeError> {
        if RESERVED_FIELDS.contains(&name) {
            return Ok(Attr::Internal { field: name.to_owned(), value: self.internal(name) });
        }

        let mut child_path = self.rel_path.clone();
        child_path.push(name.to_owned());
        let member = self.lock_subject().member(&child_path)?;

        Ok(Attr::Member(Self {
            root: Arc::clone(&self.root),
            label: format!("{}.{name}", self.label),
            rel_path: child_path,
            member: Some(member),
        }))
    }

    /// Member write. Only the `intent` internal is mutable; other reserved
    /// names are fixed bookkeeping. Non-reserved names pass straight through
    /// to the subject, unintercepted.
    pub fn set(&self, name: &str, value: Value) -> Result<(), ProbeError> {
        if RESERVED_FIELDS.contains(&name) {
            if name != "intent" {
                return Err(ProbeError::ReservedField(name.to_owned()));
            }
            let text = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
            match self.root.intent.write() {
                Ok(mut intent) => *intent = text,
                Err(poisoned) => *poisoned.into_inner() = text,
            }
            return Ok(());
        }

        let mut child_path = self.rel_path.clone();
        child_path.push(name.to_owned());
        self.lock_subject().set_member(&child_path, value)?;
        Ok(())
    }

    /// Item read; pass-through by design, not routed through the decision
    /// authority and not recorded.
    pub fn index(&self, key: &Value) -> Result<Value, ProbeError> {
        Ok(self.lock_subject().index(&self.rel_path, key)?)
    }

    /// Item write; pass-through, like `index`.
    pub fn set_index(&self, key: Value, value: Value) -> Result<(), ProbeError> {
        self.lock_subject().set_index(&self.rel_path, key, value)?;
        Ok(())
    }

    /// The one operation that runs the full decision pipeline.
    pub fn call(
        &self,
        args: Vec<Value>,
        kwargs: BTreeMap<String, Value>,
    ) -> Result<Value, ProbeError> {
        let event = CallEvent::new(self.label.clone(), args, kwargs);
        let decision = self.root.runtime.decide(&self.root.label, &event)?;
        tracing::debug!(
            call_site = %event.call_site,
            runtime = self.root.runtime.name(),
            intercept = decision.intercept,
            report = decision.report,
            halt = decision.halt,
            "decision received"
        );

        if decision.report {
            let record = ReportRecord::new(event.clone());
            if let Err(error) = self.root.report_sink.append(&record) {
                // A sink failure never aborts the supervised operation.
                tracing::warn!(call_site = %event.call_site, %error, "report sink write failed");
            }
        }

        if decision.halt {
            tracing::info!(call_site = %event.call_site, "halting for manual inspection");
            self.root.halt_hook.halt(&event);
        }

        if decision.intercept {
            // Root callables carry no member spec; ask the subject directly.
            let schema = match &self.member {
                Some(member) => member.doc.clone(),
                None => {
                    self.lock_subject().member(&self.rel_path).ok().and_then(|member| member.doc)
                }
            };
            let example = self.sample_example(&event);
            let replacement = self.root.runtime.produce_replacement(
                &self.root.label,
                &event,
                schema.as_deref(),
                example.as_ref(),
            )?;
            return Ok(replacement);
        }

        let outcome = self.lock_subject().call(&self.rel_path, &event.args, &event.kwargs);
        match outcome {
            Ok(result) => {
                self.root.runtime.acknowledge(
                    &self.root.label,
                    &event,
                    &InvocationOutcome::Returned(result.clone()),
                );
                Ok(result)
            }
            Err(error) => {
                // The attempt is recorded before the failure propagates.
                self.root.runtime.acknowledge(
                    &self.root.label,
                    &event,
                    &InvocationOutcome::Failed(error.to_string()),
                );
                Err(ProbeError::Subject(error))
            }
        }
    }

    /// Length query, routed through the same member/invoke pipeline so it is
    /// subject to interception like any other call.
    pub fn len(&self) -> Result<usize, ProbeError> {
        let value = self.get("len")?.into_member()?.call(Vec::new(), BTreeMap::new())?;
        value
            .as_u64()
            .map(|length| length as usize)
            .ok_or_else(|| ProbeError::ResultShape(format!("len returned {value}")))
    }

    /// String conversion, routed through the pipeline like `len`.
    pub fn text(&self) -> Result<String, ProbeError> {
        let value = self.get("to_string")?.into_member()?.call(Vec::new(), BTreeMap::new())?;
        Ok(match value {
            Value::String(text) => text,
            other => other.to_string(),
        })
    }

    fn internal(&self, name: &str) -> Value {
        match name {
            "target" => self.lock_subject().snapshot(),
            "intent" => Value::String(self.intent()),
            "path" => Value::String(self.label.clone()),
            "root" => Value::String(self.root.label.clone()),
            "runtime" => Value::String(self.root.runtime.name().to_owned()),
            _ => Value::Null,
        }
    }

    /// Best-effort sampling of the real result while intercepting, only for
    /// subjects that opted in. Any failure means "no example available".
    fn sample_example(&self, event: &CallEvent) -> Option<Value> {
        let mut subject = self.lock_subject();
        if !subject.example_probing_allowed() {
            return None;
        }
        match subject.call(&self.rel_path, &event.args, &event.kwargs) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::debug!(call_site = %event.call_site, %error, "example sampling failed");
                None
            }
        }
    }

    fn lock_subject(&self) -> MutexGuard<'_, Box<dyn Subject>> {
        match self.root.subject.lock() {
            Ok(subject) => subject,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl fmt::Debug for Probe {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendering = if self.rel_path.is_empty() {
            self.lock_subject().render()
        } else {
            match self.lock_subject().peek(&self.rel_path) {
                Some(value) => value.to_string(),
                None => format!("<callable {}>", self.label),
            }
        };
        write!(formatter, "<Probe wrapping {rendering}>")
    }
}

impl PartialEq for Probe {
    fn eq(&self, other: &Self) -> bool {
        self.snapshot() == other.snapshot()
    }
}

impl PartialEq<Value> for Probe {
    fn eq(&self, other: &Value) -> bool {
        self.snapshot() == *other
    }
}

/// Identity hashing comes from the path label, not the wrapped value: two
/// probes over equal but distinct objects at different paths hash apart.
impl Hash for Probe {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.label.hash(state);
    }
}

fn short_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..8].to_owned()
}
