#![forbid(unsafe_code)]

pub mod class;
pub mod compile;
pub mod config;
pub mod error;
pub mod expr;
pub mod interpret;
pub mod latent;
pub mod model;
pub mod nodes;
pub mod object;
pub mod registry;
pub mod scope;
pub mod value;
pub mod world;

pub use crate::{
    class::{ClassInfo, ClassTable},
    compile::{compile, BuildOutput, CompiledBlueprint, RuntimeGraph},
    config::RuntimeConfig,
    error::{
        CapabilityError, ClassError, Diagnostic, DiagnosticReason, DispatchError, ExecError,
        ExprError, RegistryError,
    },
    interpret::{ExecutionEvent, Interpreter, InterpreterOutput},
    latent::{LatentAction, LatentScheduler, LatentStatus},
    model::{EventGraph, GraphDefinition, LinkRecord, NodeRecord, ParamRecord},
    nodes::register_builtins,
    object::{Actor, NativeCall, ObjectId, ScriptObject},
    registry::{
        CallContext, Capability, CapabilityDescriptor, CapabilityRegistry, Invocation,
        NodeCategory, ParamType,
    },
    scope::{EventArgs, LocalScope, Variables},
    value::{Value, ValueType},
    world::{DispatchReport, DispatchStatus, Handler, TickReport, World},
};
