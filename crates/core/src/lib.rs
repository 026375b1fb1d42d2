//! Supervised interception for in-process values.
//!
//! The crate wraps a [`subject::Subject`] in a [`probe::Probe`]. Every call
//! made through the probe is submitted to a [`runtime::DecisionRuntime`],
//! which may allow it, replace its result, flag it for reporting, or halt
//! execution. Each wrapped root keeps an append-only [`history::History`]
//! that the runtime reads when deciding.

pub mod config;
pub mod errors;
pub mod event;
pub mod halt;
pub mod history;
pub mod probe;
pub mod report;
pub mod runtime;
pub mod subject;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use errors::{ProbeError, ReportSinkError, RuntimeError, SubjectError};
pub use event::{CallEvent, Decision, InvocationOutcome};
pub use halt::{HaltHook, NoopHaltHook};
pub use history::{History, HistoryRecord, HistoryStore, RetentionPolicy};
pub use probe::{wrap, wrap_with, IntoProbe, Probe, ProbeConfig, RESERVED_FIELDS};
pub use report::{InMemoryReportSink, NoopReportSink, ReportRecord, ReportSink};
pub use runtime::passthrough::PassthroughRuntime;
pub use runtime::rules::{CallSiteMatcher, DecisionRule, RuleRuntime};
pub use runtime::{DecisionRuntime, Registration};
pub use subject::builtin::{FnSubject, ListSubject, ValueSubject};
pub use subject::{MemberSpec, Subject};
