//! Gameplay objects as seen by the graph runtime.

use crate::{error::CapabilityError, scope::EventArgs, value::Value};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Generational handle to an object living in a [`World`](crate::world::World).
///
/// Runtime graphs and latent continuations refer to their object through this
/// handle only; a handle to a destroyed object never resolves again.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

impl ObjectId {
    pub fn from_raw(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NativeCall {
    Handled,
    /// The class has no native implementation of the event.
    Missing,
}

pub trait ScriptObject: Any + 'static {
    /// Most-derived class of this object.
    fn class_name(&self) -> &str;

    /// Whether the object exposes a callable for `event`.
    fn responds_to(&self, event: &str) -> bool;

    /// Exposed state, readable from parameter expressions as `owner.<name>`.
    fn fields(&self) -> Vec<(String, Value)>;

    fn field(&self, name: &str) -> Option<Value>;

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), CapabilityError>;

    /// Runs `class`'s own native implementation of `event`.
    fn invoke_native(&mut self, class: &str, event: &str, args: &EventArgs) -> NativeCall {
        let _ = (class, event, args);
        NativeCall::Missing
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

type NativeHandler = Box<dyn FnMut(&mut BTreeMap<String, Value>, &EventArgs)>;

/// Property-bag object: a class name, a set of fields and optional native
/// event handlers per class.
#[derive(Default)]
pub struct Actor {
    class: String,
    fields: BTreeMap<String, Value>,
    exposed: BTreeSet<String>,
    natives: BTreeMap<(String, String), NativeHandler>,
}

impl Actor {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            ..Default::default()
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Declares that the object has a callable for `event` without giving it a
    /// native body; the body is expected to come from a graph.
    pub fn exposes(mut self, event: impl Into<String>) -> Self {
        self.exposed.insert(event.into());
        self
    }

    pub fn with_native<F>(mut self, class: impl Into<String>, event: impl Into<String>, handler: F) -> Self
    where
        F: FnMut(&mut BTreeMap<String, Value>, &EventArgs) + 'static,
    {
        let event = event.into();
        self.exposed.insert(event.clone());
        self.natives.insert((class.into(), event), Box::new(handler));
        self
    }
}

impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("class", &self.class)
            .field("fields", &self.fields)
            .field("exposed", &self.exposed)
            .finish_non_exhaustive()
    }
}

impl ScriptObject for Actor {
    fn class_name(&self) -> &str {
        &self.class
    }

    fn responds_to(&self, event: &str) -> bool {
        self.exposed.contains(event)
    }

    fn fields(&self) -> Vec<(String, Value)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), CapabilityError> {
        self.fields.insert(name.to_string(), value);
        Ok(())
    }

    fn invoke_native(&mut self, class: &str, event: &str, args: &EventArgs) -> NativeCall {
        let key = (class.to_string(), event.to_string());
        let Some(handler) = self.natives.get_mut(&key) else {
            return NativeCall::Missing;
        };
        handler(&mut self.fields, args);
        NativeCall::Handled
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
