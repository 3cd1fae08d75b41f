use crate::model::{NodeIndex, SlotIndex};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("capability `{0}` is already registered")]
    DuplicateCapability(String),

    #[error("capability `{0}` not found")]
    NotFound(String),
}

/// Why a node or event was rejected while building a runtime graph.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiagnosticReason {
    #[error("unknown capability `{0}`")]
    UnknownCapability(String),

    #[error("link refers to node {0} outside the node list")]
    LinkOutOfRange(NodeIndex),

    #[error("link uses output slot {slot} but the node has {available}")]
    SlotOutOfRange { slot: SlotIndex, available: usize },

    #[error("output slot {0} already drives another node")]
    SlotAlreadyLinked(SlotIndex),

    #[error("start node {0} is outside the node list")]
    StartNodeOutOfRange(NodeIndex),

    #[error("start node {0} is set for an event with no graph")]
    StartWithoutGraph(NodeIndex),

    #[error("expected {expected} parameters, got {actual}")]
    ParamCountMismatch { expected: usize, actual: usize },

    #[error("parameter `{param}`: {message}")]
    LiteralTypeMismatch { param: String, message: String },

    #[error("parameter `{param}`: {message}")]
    ExpressionParse { param: String, message: String },

    #[error("only reachable through inert nodes")]
    UnreachableThroughInert,
}

/// A build-time problem, reported to the editor/log and never raised during gameplay.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{event}: {reason} (node={node:?})")]
pub struct Diagnostic {
    pub event: String,
    pub node: Option<NodeIndex>,
    pub reason: DiagnosticReason,
}

impl Diagnostic {
    pub fn new(event: impl Into<String>, reason: DiagnosticReason) -> Self {
        Self {
            event: event.into(),
            node: None,
            reason,
        }
    }

    pub fn with_node(mut self, node: NodeIndex) -> Self {
        self.node = Some(node);
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("evaluation error: {0}")]
    Eval(String),

    #[error("expression produced an unsupported value of type `{0}`")]
    Unsupported(String),

    #[error("type mismatch: {0}")]
    Type(String),
}

/// Raised by capability callables.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CapabilityError {
    #[error("missing argument `{0}`")]
    MissingArgument(String),

    #[error("argument `{name}` should be {expected}")]
    ArgumentType { name: String, expected: &'static str },

    #[error("capability needs a bound object")]
    NoObject,

    #[error("object has no field `{0}`")]
    UnknownField(String),

    #[error("{0}")]
    Failed(String),
}

/// Aborts a single dispatch. Side effects of nodes that already ran are kept.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecError {
    #[error("node {node} (`{capability}`): parameter `{param}`: {source}")]
    Parameter {
        node: NodeIndex,
        capability: String,
        param: String,
        #[source]
        source: ExprError,
    },

    #[error("node {node} (`{capability}`): {source}")]
    Capability {
        node: NodeIndex,
        capability: String,
        #[source]
        source: CapabilityError,
    },

    #[error("node {node} (`{capability}`) suspended but is not latent")]
    IllegalSuspend { node: NodeIndex, capability: String },

    #[error("step budget of {budget} exhausted, exec flow is probably cyclic")]
    StepBudgetExceeded { budget: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassError {
    #[error("class `{0}` is already registered")]
    Duplicate(String),

    #[error("class `{class}` names unknown parent `{parent}`")]
    UnknownParent { class: String, parent: String },

    #[error("unknown class `{0}`")]
    Unknown(String),
}

/// Hard dispatch failures surfaced to the caller of `dispatch_event`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("object does not exist or was destroyed")]
    UnknownObject,

    #[error("no implementation found for event `{event}` on class `{class}`")]
    NoImplementation { class: String, event: String },
}
