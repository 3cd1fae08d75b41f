//! Capability registry.
//!
//! A capability is a named callable the graph can invoke. Its descriptor carries
//! everything the builder and interpreter need: the ordered parameter schema,
//! the exec-slot table used to pick a branch from the call's result, and
//! whether the call may span several ticks. The registry is filled once at
//! startup and then shared read-only.

use crate::{
    error::{CapabilityError, RegistryError},
    interpret::ExecutionEvent,
    latent::LatentAction,
    object::ScriptObject,
    scope::{LocalScope, Variables},
    value::Value,
};
use std::collections::HashMap;

/// Name of the fallback exec slot.
pub const DEFAULT_SLOT: &str = "default";

/// Name of the single implicit output of capabilities without exec slots.
pub const THEN_SLOT: &str = "then";

/// Palette grouping shown by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeCategory {
    Event,
    FlowControl,
    Utility,
    Variable,
    Latent,
    Gameplay,
    Custom,
}

impl NodeCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            NodeCategory::Event => "Events",
            NodeCategory::FlowControl => "Flow Control",
            NodeCategory::Utility => "Utilities",
            NodeCategory::Variable => "Variables",
            NodeCategory::Latent => "Latent",
            NodeCategory::Gameplay => "Gameplay",
            NodeCategory::Custom => "Custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    Int,
    Float,
    Bool,
    String,
    List,
    Tuple(usize),
    /// Accepts whatever the bound expression produces.
    Expr,
}

impl ParamType {
    pub fn name(&self) -> String {
        match self {
            ParamType::Int => "int".to_string(),
            ParamType::Float => "float".to_string(),
            ParamType::Bool => "bool".to_string(),
            ParamType::String => "string".to_string(),
            ParamType::List => "list".to_string(),
            ParamType::Tuple(n) => format!("tuple[{n}]"),
            ParamType::Expr => "expression".to_string(),
        }
    }

    /// Converts `value` to this type. Integers widen to floats; nothing narrows.
    pub fn coerce(&self, value: Value) -> Result<Value, String> {
        let ok = match (self, &value) {
            (ParamType::Expr, _) => true,
            (ParamType::Int, Value::Int(_)) => true,
            (ParamType::Float, Value::Float(_)) => true,
            (ParamType::Float, Value::Int(i)) => return Ok(Value::Float(*i as f64)),
            (ParamType::Bool, Value::Bool(_)) => true,
            (ParamType::String, Value::String(_)) => true,
            (ParamType::List, Value::List(_)) => true,
            (ParamType::Tuple(n), Value::List(items)) => {
                if items.len() != *n {
                    return Err(format!(
                        "expected tuple[{n}], got {} elements",
                        items.len()
                    ));
                }
                true
            }
            _ => false,
        };

        if ok {
            Ok(value)
        } else {
            Err(format!(
                "expected {}, got {:?}",
                self.name(),
                value.data_type()
            ))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotPattern {
    /// Matches when the result equals any of the listed values.
    OneOf(Vec<Value>),
    /// Taken only when no other slot matched.
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecSlot {
    pub name: String,
    pub pattern: SlotPattern,
}

impl ExecSlot {
    pub fn matches(&self, result: &Value) -> bool {
        match &self.pattern {
            SlotPattern::OneOf(values) => values.iter().any(|v| v.loosely_equals(result)),
            SlotPattern::Default => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityDescriptor {
    pub id: String,
    pub category: NodeCategory,
    pub description: String,
    pub params: Vec<ParamSpec>,
    pub exec_slots: Vec<ExecSlot>,
    pub latent: bool,
    /// Invoked with the owning object bound.
    pub instance: bool,
    /// Data outputs, for the editor only.
    pub produces: Vec<ParamSpec>,
}

impl CapabilityDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category: NodeCategory::Custom,
            description: String::new(),
            params: Vec::new(),
            exec_slots: Vec::new(),
            latent: false,
            instance: false,
            produces: Vec::new(),
        }
    }

    pub fn category(mut self, category: NodeCategory) -> Self {
        self.category = category;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn param(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn slot<I, V>(mut self, name: impl Into<String>, accepts: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.exec_slots.push(ExecSlot {
            name: name.into(),
            pattern: SlotPattern::OneOf(accepts.into_iter().map(Into::into).collect()),
        });
        self
    }

    pub fn default_slot(mut self) -> Self {
        self.exec_slots.push(ExecSlot {
            name: DEFAULT_SLOT.to_string(),
            pattern: SlotPattern::Default,
        });
        self
    }

    pub fn latent(mut self) -> Self {
        self.latent = true;
        self
    }

    pub fn method(mut self) -> Self {
        self.instance = true;
        self
    }

    pub fn produces(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        self.produces.push(ParamSpec {
            name: name.into(),
            ty,
        });
        self
    }

    /// Number of exec outputs a link may refer to.
    pub fn output_count(&self) -> usize {
        self.exec_slots.len().max(1)
    }

    pub fn output_name(&self, slot: usize) -> Option<&str> {
        if self.exec_slots.is_empty() {
            return (slot == 0).then_some(THEN_SLOT);
        }
        self.exec_slots.get(slot).map(|s| s.name.as_str())
    }

    /// Picks the exec output for `result`: the first matching slot in declaration
    /// order, then the `default` slot. `None` ends the branch.
    pub fn select_slot(&self, result: &Value) -> Option<usize> {
        if self.exec_slots.is_empty() {
            return Some(0);
        }
        self.exec_slots
            .iter()
            .position(|slot| slot.matches(result))
            .or_else(|| {
                self.exec_slots
                    .iter()
                    .position(|slot| matches!(slot.pattern, SlotPattern::Default))
            })
    }
}

/// What a capability call produced.
pub enum Invocation {
    Done(Value),
    /// The result is known, but the graph must not advance until `until` completes.
    Suspend {
        value: Value,
        until: Box<dyn LatentAction>,
    },
}

impl Invocation {
    pub fn unit() -> Self {
        Invocation::Done(Value::Unit)
    }

    pub fn value(&self) -> &Value {
        match self {
            Invocation::Done(value) | Invocation::Suspend { value, .. } => value,
        }
    }
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Invocation::Done(value) => f.debug_tuple("Done").field(value).finish(),
            Invocation::Suspend { value, .. } => {
                f.debug_struct("Suspend").field("value", value).finish_non_exhaustive()
            }
        }
    }
}

/// Everything a capability sees while it runs.
pub struct CallContext<'a> {
    descriptor: &'a CapabilityDescriptor,
    args: Vec<Value>,
    object: Option<&'a mut dyn ScriptObject>,
    scope: &'a mut LocalScope,
    variables: &'a mut Variables,
    events: &'a mut Vec<ExecutionEvent>,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(
        descriptor: &'a CapabilityDescriptor,
        args: Vec<Value>,
        object: Option<&'a mut dyn ScriptObject>,
        scope: &'a mut LocalScope,
        variables: &'a mut Variables,
        events: &'a mut Vec<ExecutionEvent>,
    ) -> Self {
        Self {
            descriptor,
            args,
            object,
            scope,
            variables,
            events,
        }
    }

    pub fn capability(&self) -> &str {
        &self.descriptor.id
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn arg(&self, name: &str) -> Result<&Value, CapabilityError> {
        self.descriptor
            .params
            .iter()
            .position(|p| p.name == name)
            .and_then(|i| self.args.get(i))
            .ok_or_else(|| CapabilityError::MissingArgument(name.to_string()))
    }

    pub fn int(&self, name: &str) -> Result<i64, CapabilityError> {
        self.arg(name)?
            .as_int()
            .ok_or_else(|| type_error(name, "an int"))
    }

    pub fn float(&self, name: &str) -> Result<f64, CapabilityError> {
        self.arg(name)?
            .as_float()
            .ok_or_else(|| type_error(name, "a float"))
    }

    pub fn bool(&self, name: &str) -> Result<bool, CapabilityError> {
        self.arg(name)?
            .as_bool()
            .ok_or_else(|| type_error(name, "a bool"))
    }

    pub fn string(&self, name: &str) -> Result<&str, CapabilityError> {
        self.arg(name)?
            .as_str()
            .ok_or_else(|| type_error(name, "a string"))
    }

    pub fn list(&self, name: &str) -> Result<&[Value], CapabilityError> {
        self.arg(name)?
            .as_list()
            .ok_or_else(|| type_error(name, "a list"))
    }

    pub fn object(&mut self) -> Result<&mut dyn ScriptObject, CapabilityError> {
        match self.object.as_deref_mut() {
            Some(object) => Ok(object),
            None => Err(CapabilityError::NoObject),
        }
    }

    pub fn scope(&self) -> &LocalScope {
        &*self.scope
    }

    pub fn scope_mut(&mut self) -> &mut LocalScope {
        &mut *self.scope
    }

    pub fn variables(&self) -> &Variables {
        &*self.variables
    }

    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut *self.variables
    }

    pub fn print(&mut self, text: impl Into<String>) {
        self.events.push(ExecutionEvent::Print(text.into()));
    }
}

fn type_error(name: &str, expected: &'static str) -> CapabilityError {
    CapabilityError::ArgumentType {
        name: name.to_string(),
        expected,
    }
}

pub trait Capability: Send + Sync {
    fn invoke(&self, ctx: &mut CallContext<'_>) -> Result<Invocation, CapabilityError>;
}

impl<F> Capability for F
where
    F: Fn(&mut CallContext<'_>) -> Result<Invocation, CapabilityError> + Send + Sync,
{
    fn invoke(&self, ctx: &mut CallContext<'_>) -> Result<Invocation, CapabilityError> {
        (self)(ctx)
    }
}

/// Dense index handed out at registration; the builder stores these instead of names.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CapabilityId(u32);

struct CapabilityEntry {
    descriptor: CapabilityDescriptor,
    callable: Box<dyn Capability>,
}

#[derive(Default)]
pub struct CapabilityRegistry {
    entries: Vec<CapabilityEntry>,
    by_name: HashMap<String, CapabilityId>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        descriptor: CapabilityDescriptor,
        callable: Box<dyn Capability>,
    ) -> Result<CapabilityId, RegistryError> {
        if self.by_name.contains_key(&descriptor.id) {
            return Err(RegistryError::DuplicateCapability(descriptor.id));
        }
        let id = CapabilityId(self.entries.len() as u32);
        self.by_name.insert(descriptor.id.clone(), id);
        self.entries.push(CapabilityEntry {
            descriptor,
            callable,
        });
        Ok(id)
    }

    pub fn register_fn<F>(
        &mut self,
        descriptor: CapabilityDescriptor,
        func: F,
    ) -> Result<CapabilityId, RegistryError>
    where
        F: Fn(&mut CallContext<'_>) -> Result<Invocation, CapabilityError> + Send + Sync + 'static,
    {
        self.register(descriptor, Box::new(func))
    }

    pub fn resolve(&self, name: &str) -> Result<&CapabilityDescriptor, RegistryError> {
        self.lookup(name)
            .and_then(|id| self.get(id))
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn lookup(&self, name: &str) -> Option<CapabilityId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: CapabilityId) -> Option<&CapabilityDescriptor> {
        self.entries.get(id.0 as usize).map(|e| &e.descriptor)
    }

    pub(crate) fn callable(&self, id: CapabilityId) -> Option<&dyn Capability> {
        self.entries.get(id.0 as usize).map(|e| e.callable.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &CapabilityDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    pub fn in_category(&self, category: NodeCategory) -> Vec<&CapabilityDescriptor> {
        self.descriptors()
            .filter(|d| d.category == category)
            .collect()
    }

    pub fn categories(&self) -> Vec<NodeCategory> {
        let mut cats: Vec<_> = self.descriptors().map(|d| d.category).collect();
        cats.sort();
        cats.dedup();
        cats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_ctx: &mut CallContext<'_>) -> Result<Invocation, CapabilityError> {
        Ok(Invocation::unit())
    }

    #[test]
    fn empty_registry() {
        let registry = CapabilityRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert_eq!(
            registry.resolve("Missing"),
            Err(RegistryError::NotFound("Missing".to_string()))
        );
    }

    #[test]
    fn register_and_resolve() {
        let mut registry = CapabilityRegistry::new();
        let id = registry
            .register_fn(
                CapabilityDescriptor::new("ApplyDamage")
                    .param("amount", ParamType::Int)
                    .slot("success", [true])
                    .slot("fail", [false])
                    .method(),
                noop,
            )
            .unwrap();

        assert!(registry.contains("ApplyDamage"));
        assert_eq!(registry.lookup("ApplyDamage"), Some(id));
        let descriptor = registry.resolve("ApplyDamage").unwrap();
        assert_eq!(descriptor.params[0].name, "amount");
        assert_eq!(descriptor.output_count(), 2);
        assert!(descriptor.instance);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register_fn(CapabilityDescriptor::new("Print"), noop)
            .unwrap();
        let err = registry
            .register_fn(CapabilityDescriptor::new("Print"), noop)
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateCapability("Print".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn slot_selection_follows_declaration_order() {
        let descriptor = CapabilityDescriptor::new("Pick")
            .slot("first", [1])
            .slot("second", [1, 2])
            .default_slot();

        assert_eq!(descriptor.select_slot(&Value::Int(1)), Some(0));
        assert_eq!(descriptor.select_slot(&Value::Int(2)), Some(1));
        assert_eq!(descriptor.select_slot(&Value::Int(9)), Some(2));
        assert_eq!(descriptor.output_name(2), Some(DEFAULT_SLOT));
    }

    #[test]
    fn no_match_without_default_ends_branch() {
        let descriptor = CapabilityDescriptor::new("Check")
            .slot("yes", [true])
            .slot("no", [false]);
        assert_eq!(descriptor.select_slot(&Value::Unit), None);
    }

    #[test]
    fn plain_calls_have_a_single_then_output() {
        let descriptor = CapabilityDescriptor::new("Print");
        assert_eq!(descriptor.select_slot(&Value::Unit), Some(0));
        assert_eq!(descriptor.output_count(), 1);
        assert_eq!(descriptor.output_name(0), Some(THEN_SLOT));
        assert_eq!(descriptor.output_name(1), None);
    }

    #[test]
    fn coercion_widens_but_never_narrows() {
        assert_eq!(ParamType::Float.coerce(Value::Int(3)), Ok(Value::Float(3.0)));
        assert!(ParamType::Int.coerce(Value::Float(3.0)).is_err());
        assert!(ParamType::Tuple(2)
            .coerce(Value::List(vec![Value::Int(1)]))
            .is_err());
        assert!(ParamType::Expr.coerce(Value::from("anything")).is_ok());
    }

    #[test]
    fn categories_are_deduplicated() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register_fn(
                CapabilityDescriptor::new("A").category(NodeCategory::Utility),
                noop,
            )
            .unwrap();
        registry
            .register_fn(
                CapabilityDescriptor::new("B").category(NodeCategory::Utility),
                noop,
            )
            .unwrap();
        registry
            .register_fn(
                CapabilityDescriptor::new("C").category(NodeCategory::Latent),
                noop,
            )
            .unwrap();

        assert_eq!(
            registry.categories(),
            vec![NodeCategory::Utility, NodeCategory::Latent]
        );
        assert_eq!(registry.in_category(NodeCategory::Utility).len(), 2);
    }
}
