use thiserror::Error;

/// Failures raised by the wrapped value itself through the `Subject`
/// capability interface.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubjectError {
    #[error("unknown member `{member}` on {type_name}")]
    UnknownMember { type_name: String, member: String },
    #[error("member `{member}` is not callable")]
    NotCallable { member: String },
    #[error("member `{member}` is not assignable")]
    NotAssignable { member: String },
    #[error("invalid index `{key}` for {type_name}")]
    InvalidIndex { type_name: String, key: String },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invocation failed: {0}")]
    Invocation(String),
}

/// Failures raised by a decision runtime. None of these are retried or
/// defaulted: a call that cannot be decided fails, it is never silently
/// allowed or intercepted.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("root `{0}` is already registered")]
    AlreadyRegistered(String),
    #[error("root `{0}` is not registered")]
    Unregistered(String),
    #[error("decision source unavailable: {0}")]
    DecisionUnavailable(String),
    #[error("decision source output could not be decoded: {0}")]
    Decoding(String),
    #[error("no replacement available for `{0}`")]
    ReplacementUnavailable(String),
}

/// A report sink write failure. Logged and suppressed by the probe pipeline,
/// never surfaced to the caller of an intercepted operation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("report sink write failed: {0}")]
pub struct ReportSinkError(pub String);

/// Caller-facing error for probe operations. A fatal error aborts only the
/// single operation that triggered it; the probe and its history remain
/// usable afterwards.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Subject(#[from] SubjectError),
    #[error("reserved field `{0}` shadows probe internals")]
    ReservedField(String),
    #[error("unexpected result shape: {0}")]
    ResultShape(String),
}
