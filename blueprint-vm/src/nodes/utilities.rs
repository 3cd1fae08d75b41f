//! Utility capabilities (Print).

use super::BuiltinCapability;
use crate::{
    error::CapabilityError,
    registry::{CallContext, Capability, CapabilityDescriptor, Invocation, NodeCategory, ParamType},
};

/// Print - outputs text to the log.
pub struct PrintNode;

impl BuiltinCapability for PrintNode {
    fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor::new("Print")
            .category(NodeCategory::Utility)
            .description("Prints a value to the output log.")
            .param("text", ParamType::Expr)
    }
}

impl Capability for PrintNode {
    fn invoke(&self, ctx: &mut CallContext<'_>) -> Result<Invocation, CapabilityError> {
        let text = ctx.arg("text")?.to_string();
        tracing::info!("[Blueprint] {text}");
        ctx.print(text);
        Ok(Invocation::unit())
    }
}
