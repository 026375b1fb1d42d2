pub mod builtin;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::SubjectError;

/// The capability interface a value must satisfy to be supervised.
///
/// This replaces the open-ended reflection of a dynamic host language with
/// exactly the operations the interception design defines: member lookup,
/// member assignment, invocation, and item access. Anything else (iteration,
/// rich comparison, arithmetic) is deliberately not interceptable.
///
/// Members are addressed by a path of names relative to the root value; the
/// empty path addresses the root itself, which lets a bare callable be
/// wrapped and invoked directly.
pub trait Subject: Send {
    /// Short type name, used in the root label and the history seed.
    fn type_name(&self) -> &str;

    /// Human-readable current state.
    fn render(&self) -> String;

    /// Current value in JSON form; drives probe equality checks.
    fn snapshot(&self) -> Value;

    /// Resolve a member, or fail with `SubjectError::UnknownMember`.
    fn member(&self, path: &[String]) -> Result<MemberSpec, SubjectError>;

    /// Current value of a data member; `None` for callables.
    fn peek(&self, path: &[String]) -> Option<Value>;

    /// Assign a data member.
    fn set_member(&mut self, path: &[String], value: Value) -> Result<(), SubjectError>;

    /// Invoke a callable member; the empty path invokes the root.
    fn call(
        &mut self,
        path: &[String],
        args: &[Value],
        kwargs: &BTreeMap<String, Value>,
    ) -> Result<Value, SubjectError>;

    /// Item read on the value at `path`.
    fn index(&self, path: &[String], key: &Value) -> Result<Value, SubjectError>;

    /// Item write on the value at `path`.
    fn set_index(&mut self, path: &[String], key: Value, value: Value)
        -> Result<(), SubjectError>;

    /// Whether an intercepted call may execute the real call once, purely to
    /// sample a result example for the decision authority. Off by default:
    /// sampling a non-idempotent operation would double-execute its side
    /// effects.
    fn example_probing_allowed(&self) -> bool {
        false
    }
}

/// Static description of one member: its dotted path relative to the root,
/// the documentation/schema text attached to it (used as the result schema
/// for replacement decisions), and whether it can be invoked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSpec {
    pub path: String,
    pub doc: Option<String>,
    pub callable: bool,
}

impl MemberSpec {
    pub fn data(path: impl Into<String>) -> Self {
        Self { path: path.into(), doc: None, callable: false }
    }

    pub fn callable(path: impl Into<String>, doc: impl Into<String>) -> Self {
        Self { path: path.into(), doc: Some(doc.into()), callable: true }
    }
}

/// Joins a member path back into its dotted form for labels and errors.
pub fn dotted(path: &[String]) -> String {
    path.join(".")
}
