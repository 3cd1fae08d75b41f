use crate::{
    compile::{BoundParam, CompiledNode, ReadyNode, RuntimeGraph},
    config::RuntimeConfig,
    error::{ExecError, ExprError},
    expr::{ExprEnv, ExpressionEngine},
    latent::{Continuation, ContinuationId, LatentAction, LatentScheduler, NextTick},
    model::NodeIndex,
    object::ScriptObject,
    registry::{CallContext, CapabilityDescriptor, CapabilityRegistry, Invocation},
    scope::{EventArgs, LocalScope},
    value::Value,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    EnterNode(NodeIndex),
    Print(String),
    Suspended { event: String, node: NodeIndex },
    Resumed { event: String, node: NodeIndex },
}

#[derive(Debug, Default, Clone)]
pub struct InterpreterOutput {
    pub events: Vec<ExecutionEvent>,
}

impl InterpreterOutput {
    pub fn printed(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|event| match event {
            ExecutionEvent::Print(text) => Some(text.as_str()),
            _ => None,
        })
    }
}

/// State of one dispatch that survives a suspension.
#[derive(Debug, Clone)]
pub struct Frame {
    pub event: String,
    pub scope: LocalScope,
    /// Nodes executed so far, across resumptions.
    pub steps: usize,
}

impl Frame {
    pub fn new(event: impl Into<String>, scope: LocalScope) -> Self {
        Self {
            event: event.into(),
            scope,
            steps: 0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RunState {
    Finished,
    Suspended(ContinuationId),
}

/// Walks a [`RuntimeGraph`]. Stateless between calls; all dispatch state lives
/// in the [`Frame`].
pub struct Interpreter<'a> {
    registry: &'a CapabilityRegistry,
    engine: &'a ExpressionEngine,
    config: &'a RuntimeConfig,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        registry: &'a CapabilityRegistry,
        engine: &'a ExpressionEngine,
        config: &'a RuntimeConfig,
    ) -> Self {
        Self {
            registry,
            engine,
            config,
        }
    }

    /// Starts `event` from its start node with a fresh scope holding `args`.
    pub fn run(
        &self,
        graph: &mut RuntimeGraph,
        object: &mut dyn ScriptObject,
        scheduler: &mut LatentScheduler,
        event: &str,
        args: &EventArgs,
        out: &mut InterpreterOutput,
    ) -> Result<RunState, ExecError> {
        let Some(start) = graph.entry(event) else {
            return Ok(RunState::Finished);
        };
        let frame = Frame::new(event, LocalScope::for_event(event, args));
        self.execute(graph, object, scheduler, frame, Some(start), out)
    }

    /// Continues a chain after its latent node completed.
    pub fn resume(
        &self,
        graph: &mut RuntimeGraph,
        object: &mut dyn ScriptObject,
        scheduler: &mut LatentScheduler,
        continuation: Continuation,
        out: &mut InterpreterOutput,
    ) -> Result<RunState, ExecError> {
        let Continuation {
            frame, node, slot, ..
        } = continuation;

        tracing::debug!("resume {}@{node} on {}", frame.event, graph.owner());
        out.events.push(ExecutionEvent::Resumed {
            event: frame.event.clone(),
            node,
        });

        let next = slot.and_then(|slot| graph.successor(&frame.event, node, slot));
        self.execute(graph, object, scheduler, frame, next, out)
    }

    fn execute(
        &self,
        graph: &mut RuntimeGraph,
        object: &mut dyn ScriptObject,
        scheduler: &mut LatentScheduler,
        mut frame: Frame,
        mut current: Option<NodeIndex>,
        out: &mut InterpreterOutput,
    ) -> Result<RunState, ExecError> {
        let blueprint = graph.blueprint().clone();
        let Some(program) = blueprint.event(&frame.event) else {
            return Ok(RunState::Finished);
        };

        while let Some(index) = current {
            let node = match program.nodes.get(index) {
                Some(CompiledNode::Ready(node)) => node,
                // Inert: the branch ends here.
                Some(CompiledNode::Inert) | None => break,
            };

            if frame.steps >= self.config.step_budget {
                return Err(ExecError::StepBudgetExceeded {
                    budget: self.config.step_budget,
                });
            }
            frame.steps += 1;

            let (Some(descriptor), Some(callable)) = (
                self.registry.get(node.capability),
                self.registry.callable(node.capability),
            ) else {
                break;
            };

            tracing::trace!("enter {}@{index} ({})", frame.event, descriptor.id);
            if self.config.trace_nodes {
                out.events.push(ExecutionEvent::EnterNode(index));
            }

            let args = self.bind(index, node, descriptor, &frame.scope, graph, &*object)?;

            let invocation = {
                let bound = if descriptor.instance {
                    Some(&mut *object)
                } else {
                    None
                };
                let mut ctx = CallContext::new(
                    descriptor,
                    args,
                    bound,
                    &mut frame.scope,
                    &mut graph.variables,
                    &mut out.events,
                );
                callable
                    .invoke(&mut ctx)
                    .map_err(|source| ExecError::Capability {
                        node: index,
                        capability: descriptor.id.clone(),
                        source,
                    })?
            };

            let slot = descriptor.select_slot(invocation.value());

            let until: Box<dyn LatentAction> = match invocation {
                Invocation::Suspend { .. } if !descriptor.latent => {
                    return Err(ExecError::IllegalSuspend {
                        node: index,
                        capability: descriptor.id.clone(),
                    });
                }
                Invocation::Suspend { until, .. } => until,
                // Latent calls never advance in the tick they started in.
                Invocation::Done(_) if descriptor.latent => Box::new(NextTick),
                Invocation::Done(_) => {
                    current = slot.and_then(|slot| program.successor(index, slot));
                    continue;
                }
            };

            out.events.push(ExecutionEvent::Suspended {
                event: frame.event.clone(),
                node: index,
            });
            let id = scheduler.suspend(
                graph.owner(),
                Continuation {
                    class: graph.class().to_string(),
                    frame,
                    node: index,
                    slot,
                    until,
                },
            );
            return Ok(RunState::Suspended(id));
        }

        Ok(RunState::Finished)
    }

    /// Resolves the node's parameters. Expressions are evaluated afresh each time.
    fn bind(
        &self,
        index: NodeIndex,
        node: &ReadyNode,
        descriptor: &CapabilityDescriptor,
        scope: &LocalScope,
        graph: &RuntimeGraph,
        object: &dyn ScriptObject,
    ) -> Result<Vec<Value>, ExecError> {
        let env = ExprEnv {
            scope,
            variables: &graph.variables,
            owner: Some(object),
        };

        descriptor
            .params
            .iter()
            .zip(node.params.iter())
            .map(|(spec, param)| {
                let value = match param {
                    BoundParam::Literal(value) => return Ok(value.clone()),
                    BoundParam::Expr(expr) => self.engine.evaluate(expr, &env),
                };
                value
                    .and_then(|value| spec.ty.coerce(value).map_err(ExprError::Type))
                    .map_err(|source| ExecError::Parameter {
                        node: index,
                        capability: descriptor.id.clone(),
                        param: spec.name.clone(),
                        source,
                    })
            })
            .collect()
    }
}
