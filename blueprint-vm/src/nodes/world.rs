//! World interaction capabilities.

use super::BuiltinCapability;
use crate::{
    error::CapabilityError,
    registry::{CallContext, Capability, CapabilityDescriptor, Invocation, NodeCategory, ParamType},
};

/// SetField - writes a field of the owning object.
pub struct SetFieldNode;

impl BuiltinCapability for SetFieldNode {
    fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor::new("SetField")
            .category(NodeCategory::Gameplay)
            .description("Sets a field on the object that owns this graph.")
            .param("field", ParamType::String)
            .param("value", ParamType::Expr)
            .method()
    }
}

impl Capability for SetFieldNode {
    fn invoke(&self, ctx: &mut CallContext<'_>) -> Result<Invocation, CapabilityError> {
        let field = ctx.string("field")?.to_string();
        let value = ctx.arg("value")?.clone();
        ctx.object()?.set_field(&field, value)?;
        Ok(Invocation::unit())
    }
}
