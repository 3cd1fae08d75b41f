use crate::value::Value;
use std::collections::BTreeMap;

/// Per-object graph variables. Persist across dispatches.
pub type Variables = BTreeMap<String, Value>;

/// Named event arguments handed to `dispatch_event`.
pub type EventArgs = BTreeMap<String, Value>;

/// Name under which the dispatched event's name is bound.
pub const EVENT_NAME: &str = "event";

/// Named values visible to parameter expressions during one dispatch.
///
/// A scope is created fresh for every dispatch and travels with a latent chain
/// until its last node completes. It is never shared between dispatches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalScope {
    values: BTreeMap<String, Value>,
}

impl LocalScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the event arguments, each under its own name, plus the reserved
    /// `event` name. An argument called `event` is shadowed.
    pub fn for_event(event: &str, args: &EventArgs) -> Self {
        let mut scope = Self::new();
        for (name, value) in args {
            scope.set(name.clone(), value.clone());
        }
        scope.set(EVENT_NAME, Value::from(event));
        scope
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
