use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{json, Value};

use crate::errors::SubjectError;
use crate::subject::{dotted, MemberSpec, Subject};

const LIST_MEMBERS: &[(&str, &str)] = &[
    ("append", "append(value) -> null — push one value onto the end of the list"),
    ("extend", "extend(values: array) -> null — push every element of `values`"),
    ("pop", "pop() -> value — remove and return the last element; fails when the list is empty"),
    ("clear", "clear() -> null — remove every element"),
    ("len", "len() -> integer — number of elements"),
    ("to_string", "to_string() -> string — JSON rendering of the list"),
];

/// An ordered JSON list. The backing storage is shared, so a caller can keep
/// an unwrapped handle and observe mutations made through the probe.
#[derive(Clone, Debug, Default)]
pub struct ListSubject {
    items: Arc<Mutex<Vec<Value>>>,
}

impl ListSubject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        Self { items: Arc::new(Mutex::new(values)) }
    }

    /// Unsupervised handle on the backing storage.
    pub fn handle(&self) -> Arc<Mutex<Vec<Value>>> {
        Arc::clone(&self.items)
    }

    fn items(&self) -> MutexGuard<'_, Vec<Value>> {
        match self.items.lock() {
            Ok(items) => items,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn expect_single_arg<'a>(member: &str, args: &'a [Value]) -> Result<&'a Value, SubjectError> {
        match args {
            [value] => Ok(value),
            _ => Err(SubjectError::InvalidArgument(format!(
                "{member} takes exactly one argument, got {}",
                args.len()
            ))),
        }
    }
}

impl Subject for ListSubject {
    fn type_name(&self) -> &str {
        "List"
    }

    fn render(&self) -> String {
        Value::Array(self.items().clone()).to_string()
    }

    fn snapshot(&self) -> Value {
        Value::Array(self.items().clone())
    }

    fn member(&self, path: &[String]) -> Result<MemberSpec, SubjectError> {
        match path {
            [] => Ok(MemberSpec::data("")),
            [name] => LIST_MEMBERS
                .iter()
                .find(|(member, _)| member == name)
                .map(|(member, doc)| MemberSpec::callable(*member, *doc))
                .ok_or_else(|| SubjectError::UnknownMember {
                    type_name: self.type_name().to_owned(),
                    member: name.clone(),
                }),
            _ => Err(SubjectError::UnknownMember {
                type_name: self.type_name().to_owned(),
                member: dotted(path),
            }),
        }
    }

    fn peek(&self, path: &[String]) -> Option<Value> {
        path.is_empty().then(|| self.snapshot())
    }

    fn set_member(&mut self, path: &[String], _value: Value) -> Result<(), SubjectError> {
        Err(SubjectError::NotAssignable { member: dotted(path) })
    }

    fn call(
        &mut self,
        path: &[String],
        args: &[Value],
        kwargs: &BTreeMap<String, Value>,
    ) -> Result<Value, SubjectError> {
        let member = self.member(path)?;
        if !member.callable {
            return Err(SubjectError::NotCallable { member: dotted(path) });
        }
        if !kwargs.is_empty() {
            return Err(SubjectError::InvalidArgument(format!(
                "{} does not accept keyword arguments",
                member.path
            )));
        }

        match member.path.as_str() {
            "append" => {
                let value = Self::expect_single_arg("append", args)?.clone();
                self.items().push(value);
                Ok(Value::Null)
            }
            "extend" => {
                let values = Self::expect_single_arg("extend", args)?;
                let Value::Array(values) = values else {
                    return Err(SubjectError::InvalidArgument(
                        "extend expects an array argument".to_owned(),
                    ));
                };
                self.items().extend(values.iter().cloned());
                Ok(Value::Null)
            }
            "pop" => self
                .items()
                .pop()
                .ok_or_else(|| SubjectError::Invocation("pop from empty list".to_owned())),
            "clear" => {
                self.items().clear();
                Ok(Value::Null)
            }
            "len" => Ok(json!(self.items().len())),
            "to_string" => Ok(Value::String(self.render())),
            _ => Err(SubjectError::NotCallable { member: member.path }),
        }
    }

    fn index(&self, path: &[String], key: &Value) -> Result<Value, SubjectError> {
        if !path.is_empty() {
            return Err(SubjectError::InvalidIndex {
                type_name: self.type_name().to_owned(),
                key: key.to_string(),
            });
        }
        let items = self.items();
        key.as_u64()
            .and_then(|position| items.get(position as usize).cloned())
            .ok_or_else(|| SubjectError::InvalidIndex {
                type_name: self.type_name().to_owned(),
                key: key.to_string(),
            })
    }

    fn set_index(
        &mut self,
        path: &[String],
        key: Value,
        value: Value,
    ) -> Result<(), SubjectError> {
        if !path.is_empty() {
            return Err(SubjectError::InvalidIndex {
                type_name: self.type_name().to_owned(),
                key: key.to_string(),
            });
        }
        let mut items = self.items();
        let slot = key
            .as_u64()
            .and_then(|position| items.get_mut(position as usize))
            .ok_or_else(|| SubjectError::InvalidIndex {
                type_name: "List".to_owned(),
                key: key.to_string(),
            })?;
        *slot = value;
        Ok(())
    }
}

/// An arbitrary JSON value. Object fields are data members and nested dotted
/// paths resolve through objects; `len` and `to_string` are callable anywhere
/// they make sense.
#[derive(Clone, Debug)]
pub struct ValueSubject {
    type_name: String,
    value: Value,
}

impl ValueSubject {
    pub fn new(value: Value) -> Self {
        let type_name = match &value {
            Value::Object(_) => "Object",
            Value::Array(_) => "Array",
            Value::String(_) => "String",
            Value::Number(_) => "Number",
            Value::Bool(_) => "Bool",
            Value::Null => "Null",
        };
        Self { type_name: type_name.to_owned(), value }
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    fn resolve(&self, path: &[String]) -> Option<&Value> {
        let mut current = &self.value;
        for segment in path {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    fn resolve_mut(&mut self, path: &[String]) -> Option<&mut Value> {
        let mut current = &mut self.value;
        for segment in path {
            current = current.as_object_mut()?.get_mut(segment)?;
        }
        Some(current)
    }

    fn unknown(&self, path: &[String]) -> SubjectError {
        SubjectError::UnknownMember { type_name: self.type_name.clone(), member: dotted(path) }
    }

    fn split_builtin<'a>(path: &'a [String]) -> Option<(&'a [String], &'a str)> {
        let (last, prefix) = path.split_last()?;
        matches!(last.as_str(), "len" | "to_string").then(|| (prefix, last.as_str()))
    }
}

impl Subject for ValueSubject {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn render(&self) -> String {
        self.value.to_string()
    }

    fn snapshot(&self) -> Value {
        self.value.clone()
    }

    fn member(&self, path: &[String]) -> Result<MemberSpec, SubjectError> {
        if let Some((prefix, builtin)) = Self::split_builtin(path) {
            if self.resolve(prefix).is_some() {
                let doc = match builtin {
                    "len" => "len() -> integer — element, field, or character count",
                    _ => "to_string() -> string — JSON rendering of the value",
                };
                return Ok(MemberSpec::callable(dotted(path), doc));
            }
        }
        self.resolve(path).map(|_| MemberSpec::data(dotted(path))).ok_or_else(|| self.unknown(path))
    }

    fn peek(&self, path: &[String]) -> Option<Value> {
        if Self::split_builtin(path).is_some() {
            return None;
        }
        self.resolve(path).cloned()
    }

    fn set_member(&mut self, path: &[String], value: Value) -> Result<(), SubjectError> {
        let Some((last, prefix)) = path.split_last() else {
            return Err(SubjectError::NotAssignable { member: String::new() });
        };
        let unknown = self.unknown(prefix);
        let parent =
            self.resolve_mut(prefix).and_then(Value::as_object_mut).ok_or(unknown)?;
        parent.insert(last.clone(), value);
        Ok(())
    }

    fn call(
        &mut self,
        path: &[String],
        _args: &[Value],
        _kwargs: &BTreeMap<String, Value>,
    ) -> Result<Value, SubjectError> {
        let Some((prefix, builtin)) = Self::split_builtin(path) else {
            return Err(SubjectError::NotCallable { member: dotted(path) });
        };
        let target = self.resolve(prefix).ok_or_else(|| self.unknown(prefix))?;
        match builtin {
            "len" => {
                let length = match target {
                    Value::Array(items) => items.len(),
                    Value::Object(fields) => fields.len(),
                    Value::String(text) => text.chars().count(),
                    _ => {
                        return Err(SubjectError::NotCallable { member: dotted(path) });
                    }
                };
                Ok(json!(length))
            }
            _ => Ok(Value::String(target.to_string())),
        }
    }

    fn index(&self, path: &[String], key: &Value) -> Result<Value, SubjectError> {
        let target = self.resolve(path).ok_or_else(|| self.unknown(path))?;
        let item = match (target, key) {
            (Value::Array(items), Value::Number(position)) => {
                position.as_u64().and_then(|position| items.get(position as usize))
            }
            (Value::Object(fields), Value::String(field)) => fields.get(field),
            _ => None,
        };
        item.cloned().ok_or_else(|| SubjectError::InvalidIndex {
            type_name: self.type_name.clone(),
            key: key.to_string(),
        })
    }

    fn set_index(&mut self, path: &[String], key: Value, value: Value) -> Result<(), SubjectError> {
        let type_name = self.type_name.clone();
        let target = self.resolve_mut(path).ok_or_else(|| SubjectError::UnknownMember {
            type_name: type_name.clone(),
            member: dotted(path),
        })?;
        match (target, &key) {
            (Value::Array(items), Value::Number(position)) => {
                let slot = position
                    .as_u64()
                    .and_then(|position| items.get_mut(position as usize))
                    .ok_or_else(|| SubjectError::InvalidIndex {
                        type_name: type_name.clone(),
                        key: key.to_string(),
                    })?;
                *slot = value;
                Ok(())
            }
            (Value::Object(fields), Value::String(field)) => {
                fields.insert(field.clone(), value);
                Ok(())
            }
            _ => Err(SubjectError::InvalidIndex { type_name, key: key.to_string() }),
        }
    }
}

type BoxedFn =
    Box<dyn FnMut(&[Value], &BTreeMap<String, Value>) -> Result<Value, SubjectError> + Send>;

/// A bare callable root: wraps a closure together with the doc/schema text
/// the decision authority sees when it replaces a call.
pub struct FnSubject {
    name: String,
    doc: Option<String>,
    example_probing: bool,
    func: BoxedFn,
}

impl FnSubject {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: FnMut(&[Value], &BTreeMap<String, Value>) -> Result<Value, SubjectError>
            + Send
            + 'static,
    {
        Self { name: name.into(), doc: None, example_probing: false, func: Box::new(func) }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Opt in to the best-effort example call made while intercepting. Only
    /// safe for idempotent functions.
    pub fn with_example_probing(mut self) -> Self {
        self.example_probing = true;
        self
    }
}

impl std::fmt::Debug for FnSubject {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("FnSubject")
            .field("name", &self.name)
            .field("doc", &self.doc)
            .field("example_probing", &self.example_probing)
            .finish_non_exhaustive()
    }
}

impl Subject for FnSubject {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn render(&self) -> String {
        format!("<function {}>", self.name)
    }

    fn snapshot(&self) -> Value {
        Value::String(self.render())
    }

    fn member(&self, path: &[String]) -> Result<MemberSpec, SubjectError> {
        if path.is_empty() {
            let mut spec = MemberSpec::data("");
            spec.callable = true;
            spec.doc = self.doc.clone();
            Ok(spec)
        } else {
            Err(SubjectError::UnknownMember {
                type_name: self.name.clone(),
                member: dotted(path),
            })
        }
    }

    fn peek(&self, _path: &[String]) -> Option<Value> {
        None
    }

    fn set_member(&mut self, path: &[String], _value: Value) -> Result<(), SubjectError> {
        Err(SubjectError::NotAssignable { member: dotted(path) })
    }

    fn call(
        &mut self,
        path: &[String],
        args: &[Value],
        kwargs: &BTreeMap<String, Value>,
    ) -> Result<Value, SubjectError> {
        if !path.is_empty() {
            return Err(SubjectError::NotCallable { member: dotted(path) });
        }
        (self.func)(args, kwargs)
    }

    fn index(&self, _path: &[String], key: &Value) -> Result<Value, SubjectError> {
        Err(SubjectError::InvalidIndex { type_name: self.name.clone(), key: key.to_string() })
    }

    fn set_index(&mut self, _path: &[String], key: Value, _value: Value) -> Result<(), SubjectError> {
        Err(SubjectError::InvalidIndex { type_name: self.name.clone(), key: key.to_string() })
    }

    fn example_probing_allowed(&self) -> bool {
        self.example_probing
    }
}
