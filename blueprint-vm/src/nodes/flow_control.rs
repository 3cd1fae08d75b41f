//! Flow control capabilities (Branch, Compare).

use super::BuiltinCapability;
use crate::{
    error::CapabilityError,
    registry::{CallContext, Capability, CapabilityDescriptor, Invocation, NodeCategory, ParamType},
    value::Value,
};
use std::cmp::Ordering;

/// Branch - if/else flow control.
pub struct BranchNode;

impl BuiltinCapability for BranchNode {
    fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor::new("Branch")
            .category(NodeCategory::FlowControl)
            .description("Executes one of two paths based on a boolean condition.")
            .param("condition", ParamType::Bool)
            .slot("true", [true])
            .slot("false", [false])
    }
}

impl Capability for BranchNode {
    fn invoke(&self, ctx: &mut CallContext<'_>) -> Result<Invocation, CapabilityError> {
        Ok(Invocation::Done(Value::Bool(ctx.bool("condition")?)))
    }
}

/// Compare - three-way numeric comparison.
pub struct CompareNode;

impl BuiltinCapability for CompareNode {
    fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor::new("Compare")
            .category(NodeCategory::FlowControl)
            .description("Compares two numbers and continues on less, equal or greater.")
            .param("a", ParamType::Float)
            .param("b", ParamType::Float)
            .slot("less", [-1])
            .slot("equal", [0])
            .slot("greater", [1])
    }
}

impl Capability for CompareNode {
    fn invoke(&self, ctx: &mut CallContext<'_>) -> Result<Invocation, CapabilityError> {
        let (a, b) = (ctx.float("a")?, ctx.float("b")?);
        // NaN matches no slot and ends the branch.
        let result = match a.partial_cmp(&b) {
            Some(Ordering::Less) => Value::Int(-1),
            Some(Ordering::Equal) => Value::Int(0),
            Some(Ordering::Greater) => Value::Int(1),
            None => Value::Unit,
        };
        Ok(Invocation::Done(result))
    }
}
