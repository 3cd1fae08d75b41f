//! Latent capabilities. Each suspends the chain until its condition completes.

use super::BuiltinCapability;
use crate::{
    error::CapabilityError,
    latent::{Delay, NextTick, WaitFrames},
    registry::{CallContext, Capability, CapabilityDescriptor, Invocation, NodeCategory, ParamType},
    value::Value,
};

/// Delay - continues after the given number of seconds of tick time.
pub struct DelayNode;

impl BuiltinCapability for DelayNode {
    fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor::new("Delay")
            .category(NodeCategory::Latent)
            .description("Waits for a number of seconds before continuing.")
            .param("seconds", ParamType::Float)
            .latent()
    }
}

impl Capability for DelayNode {
    fn invoke(&self, ctx: &mut CallContext<'_>) -> Result<Invocation, CapabilityError> {
        let seconds = ctx.float("seconds")?;
        Ok(Invocation::Suspend {
            value: Value::Unit,
            until: Box::new(Delay::new(seconds as f32)),
        })
    }
}

/// NextTick - continues on the next tick.
pub struct NextTickNode;

impl BuiltinCapability for NextTickNode {
    fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor::new("NextTick")
            .category(NodeCategory::Latent)
            .description("Continues on the next tick.")
            .latent()
    }
}

impl Capability for NextTickNode {
    fn invoke(&self, _ctx: &mut CallContext<'_>) -> Result<Invocation, CapabilityError> {
        Ok(Invocation::Suspend {
            value: Value::Unit,
            until: Box::new(NextTick),
        })
    }
}

/// WaitFrames - continues after the given number of ticks.
pub struct WaitFramesNode;

impl BuiltinCapability for WaitFramesNode {
    fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor::new("WaitFrames")
            .category(NodeCategory::Latent)
            .description("Waits for a number of ticks before continuing.")
            .param("frames", ParamType::Int)
            .latent()
    }
}

impl Capability for WaitFramesNode {
    fn invoke(&self, ctx: &mut CallContext<'_>) -> Result<Invocation, CapabilityError> {
        let frames = u32::try_from(ctx.int("frames")?).map_err(|_| CapabilityError::ArgumentType {
            name: "frames".to_string(),
            expected: "a non-negative int",
        })?;
        Ok(Invocation::Suspend {
            value: Value::Unit,
            until: Box::new(WaitFrames::new(frames)),
        })
    }
}
