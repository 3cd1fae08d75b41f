//! Variable capabilities.
//!
//! Reads need no node: expressions see graph variables and local names directly.

use super::BuiltinCapability;
use crate::{
    error::CapabilityError,
    registry::{CallContext, Capability, CapabilityDescriptor, Invocation, NodeCategory, ParamType},
};

/// SetVariable - writes a graph variable. Persists across dispatches.
pub struct SetVariableNode;

impl BuiltinCapability for SetVariableNode {
    fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor::new("SetVariable")
            .category(NodeCategory::Variable)
            .description("Sets the value of a graph variable.")
            .param("name", ParamType::String)
            .param("value", ParamType::Expr)
            .produces("value", ParamType::Expr)
    }
}

impl Capability for SetVariableNode {
    fn invoke(&self, ctx: &mut CallContext<'_>) -> Result<Invocation, CapabilityError> {
        let name = ctx.string("name")?.to_string();
        let value = ctx.arg("value")?.clone();
        ctx.variables_mut().insert(name, value.clone());
        Ok(Invocation::Done(value))
    }
}

/// SetLocal - binds a name in the current dispatch's scope only.
pub struct SetLocalNode;

impl BuiltinCapability for SetLocalNode {
    fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor::new("SetLocal")
            .category(NodeCategory::Variable)
            .description("Binds a name for the rest of this event.")
            .param("name", ParamType::String)
            .param("value", ParamType::Expr)
            .produces("value", ParamType::Expr)
    }
}

impl Capability for SetLocalNode {
    fn invoke(&self, ctx: &mut CallContext<'_>) -> Result<Invocation, CapabilityError> {
        let name = ctx.string("name")?.to_string();
        let value = ctx.arg("value")?.clone();
        ctx.scope_mut().set(name, value.clone());
        Ok(Invocation::Done(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{nodes::test_util::Harness, value::Value};

    #[test]
    fn set_variable_and_set_local_write_different_tables() {
        let mut harness = Harness::new();
        harness
            .call(
                &SetVariableNode.descriptor(),
                &SetVariableNode,
                vec![Value::from("ammo"), Value::Int(3)],
                None,
            )
            .unwrap();
        harness
            .call(
                &SetLocalNode.descriptor(),
                &SetLocalNode,
                vec![Value::from("combo"), Value::Int(2)],
                None,
            )
            .unwrap();

        assert_eq!(harness.variables.get("ammo"), Some(&Value::Int(3)));
        assert!(!harness.scope.contains("ammo"));
        assert_eq!(harness.scope.get("combo"), Some(&Value::Int(2)));
        assert!(!harness.variables.contains_key("combo"));
    }
}
