//! Built-in capabilities.
//!
//! To add a new one:
//! 1. Create a file in this folder (or extend the matching category file)
//! 2. Implement `Capability` and `BuiltinCapability` for it
//! 3. Add it to `register_builtins`

mod flow_control;
mod timing;
mod utilities;
mod variables;
mod world;

pub use flow_control::*;
pub use timing::*;
pub use utilities::*;
pub use variables::*;
pub use world::*;

use crate::{
    error::RegistryError,
    registry::{Capability, CapabilityDescriptor, CapabilityRegistry},
};

/// A capability that knows its own descriptor.
pub trait BuiltinCapability: Capability {
    fn descriptor(&self) -> CapabilityDescriptor;
}

fn register<C: BuiltinCapability + 'static>(
    registry: &mut CapabilityRegistry,
    capability: C,
) -> Result<(), RegistryError> {
    registry.register(capability.descriptor(), Box::new(capability))?;
    Ok(())
}

/// Registers every built-in capability. Fails if any of their names is taken.
pub fn register_builtins(registry: &mut CapabilityRegistry) -> Result<(), RegistryError> {
    // Flow Control
    register(registry, BranchNode)?;
    register(registry, CompareNode)?;
    // Utilities
    register(registry, PrintNode)?;
    // Variables
    register(registry, SetVariableNode)?;
    register(registry, SetLocalNode)?;
    // World Interaction
    register(registry, SetFieldNode)?;
    // Latent
    register(registry, DelayNode)?;
    register(registry, NextTickNode)?;
    register(registry, WaitFramesNode)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_util {
    use crate::{
        error::CapabilityError,
        interpret::ExecutionEvent,
        object::ScriptObject,
        registry::{CallContext, Capability, CapabilityDescriptor, Invocation},
        scope::{LocalScope, Variables},
        value::Value,
    };

    /// Invokes `capability` with `args` outside of any graph.
    pub struct Harness {
        pub scope: LocalScope,
        pub variables: Variables,
        pub events: Vec<ExecutionEvent>,
    }

    impl Harness {
        pub fn new() -> Self {
            Self {
                scope: LocalScope::new(),
                variables: Variables::new(),
                events: Vec::new(),
            }
        }

        pub fn call(
            &mut self,
            descriptor: &CapabilityDescriptor,
            capability: &dyn Capability,
            args: Vec<Value>,
            object: Option<&mut dyn ScriptObject>,
        ) -> Result<Invocation, CapabilityError> {
            let mut ctx = CallContext::new(
                descriptor,
                args,
                object,
                &mut self.scope,
                &mut self.variables,
                &mut self.events,
            );
            capability.invoke(&mut ctx)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NodeCategory;

    #[test]
    fn builtins_register_once() {
        let mut registry = CapabilityRegistry::new();
        register_builtins(&mut registry).unwrap();

        assert_eq!(registry.len(), 9);
        assert!(registry.contains("Branch"));
        assert!(registry.resolve("Delay").unwrap().latent);
        assert!(registry.resolve("SetField").unwrap().instance);
        assert_eq!(registry.in_category(NodeCategory::Latent).len(), 3);

        assert_eq!(
            register_builtins(&mut registry),
            Err(RegistryError::DuplicateCapability("Branch".to_string()))
        );
    }
}
