//! Object arena, event dispatch and the per-tick latent poll.

use crate::{
    class::ClassTable,
    compile::{compile, RuntimeGraph},
    config::RuntimeConfig,
    error::{ClassError, Diagnostic, DispatchError, ExecError},
    expr::ExpressionEngine,
    interpret::{Interpreter, InterpreterOutput, RunState},
    latent::LatentScheduler,
    model::GraphDefinition,
    object::{NativeCall, ObjectId, ScriptObject},
    registry::CapabilityRegistry,
    scope::EventArgs,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Who handled a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handler {
    /// The runtime graph generated for `class` ran.
    Graph { class: String },
    /// `class`'s native implementation ran.
    Native { class: String },
    /// The entry precondition failed; nothing ran.
    NoOp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchStatus {
    Completed,
    /// Parked on a latent node; the rest runs from [`World::tick`].
    Suspended,
    /// The chain stopped early. Side effects of nodes that already ran are kept.
    Aborted(ExecError),
}

#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub handler: Handler,
    pub status: DispatchStatus,
    pub output: InterpreterOutput,
}

impl DispatchReport {
    fn new(handler: Handler, status: DispatchStatus) -> Self {
        Self {
            handler,
            status,
            output: InterpreterOutput::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Resumption {
    pub owner: ObjectId,
    pub class: String,
    pub event: String,
    pub status: DispatchStatus,
    pub output: InterpreterOutput,
}

#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub resumed: Vec<Resumption>,
    /// Completed continuations whose owner no longer exists.
    pub dropped: usize,
}

struct Entry {
    object: Box<dyn ScriptObject>,
    /// One runtime graph per generated class in the object's chain.
    graphs: BTreeMap<String, RuntimeGraph>,
}

#[derive(Default)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

fn entry_of(slots: &[Slot], id: ObjectId) -> Option<&Entry> {
    slots
        .get(id.index() as usize)
        .filter(|slot| slot.generation == id.generation())?
        .entry
        .as_ref()
}

fn entry_of_mut(slots: &mut [Slot], id: ObjectId) -> Option<&mut Entry> {
    slots
        .get_mut(id.index() as usize)
        .filter(|slot| slot.generation == id.generation())?
        .entry
        .as_mut()
}

fn status_of(result: Result<RunState, ExecError>) -> DispatchStatus {
    match result {
        Ok(RunState::Finished) => DispatchStatus::Completed,
        Ok(RunState::Suspended(_)) => DispatchStatus::Suspended,
        Err(err) => DispatchStatus::Aborted(err),
    }
}

pub struct World {
    config: RuntimeConfig,
    registry: Arc<CapabilityRegistry>,
    engine: ExpressionEngine,
    classes: ClassTable,
    slots: Vec<Slot>,
    free: Vec<u32>,
    scheduler: LatentScheduler,
}

impl World {
    pub fn new(config: RuntimeConfig, registry: impl Into<Arc<CapabilityRegistry>>) -> Self {
        Self {
            engine: ExpressionEngine::new(&config),
            config,
            registry: registry.into(),
            classes: ClassTable::new(),
            slots: Vec::new(),
            free: Vec::new(),
            scheduler: LatentScheduler::new(),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    pub fn scheduler(&self) -> &LatentScheduler {
        &self.scheduler
    }

    pub fn register_native_class(
        &mut self,
        name: &str,
        parent: Option<&str>,
    ) -> Result<(), ClassError> {
        self.classes.register_native(name, parent)
    }

    /// Builds `def` and registers the result as a generated class. Build problems
    /// do not fail registration; they are returned and kept for
    /// [`diagnostics`](Self::diagnostics).
    pub fn register_blueprint_class(
        &mut self,
        name: &str,
        parent: Option<&str>,
        def: &GraphDefinition,
    ) -> Result<Vec<Diagnostic>, ClassError> {
        let built = compile(def, &self.registry, &self.engine);
        self.classes
            .register_generated(name, parent, built.blueprint, built.diagnostics.clone())?;
        tracing::info!(
            "registered blueprint class `{name}` ({} diagnostic(s))",
            built.diagnostics.len()
        );
        Ok(built.diagnostics)
    }

    pub fn diagnostics(&self, class: &str) -> &[Diagnostic] {
        self.classes
            .get(class)
            .map(|info| info.diagnostics.as_slice())
            .unwrap_or_default()
    }

    /// Adds `object` to the world and binds a runtime graph for every generated
    /// class in its chain.
    pub fn spawn(&mut self, object: impl ScriptObject) -> Result<ObjectId, ClassError> {
        self.spawn_boxed(Box::new(object))
    }

    pub fn spawn_boxed(&mut self, object: Box<dyn ScriptObject>) -> Result<ObjectId, ClassError> {
        let class = object.class_name().to_string();
        if !self.classes.contains(&class) {
            return Err(ClassError::Unknown(class));
        }

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let id = ObjectId::from_raw(index, slot.generation);

        let graphs = self
            .classes
            .chain(&class)
            .filter_map(|info| {
                let blueprint = info.blueprint.clone()?;
                Some((
                    info.name.clone(),
                    RuntimeGraph::new(info.name.clone(), id, blueprint),
                ))
            })
            .collect();

        slot.entry = Some(Entry { object, graphs });
        tracing::debug!("spawned {id} of class `{class}`");
        Ok(id)
    }

    /// Removes the object and cancels every continuation it owns. Its handle
    /// never resolves again.
    pub fn destroy(&mut self, id: ObjectId) -> Option<Box<dyn ScriptObject>> {
        let slot = self
            .slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())?;
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());

        self.scheduler.cancel(id);
        tracing::debug!("destroyed {id}");
        Some(entry.object)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        entry_of(&self.slots, id).is_some()
    }

    /// Handles of every live object, in slot order.
    pub fn ids(&self) -> Vec<ObjectId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.entry.is_some())
            .map(|(index, slot)| ObjectId::from_raw(index as u32, slot.generation))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn object(&self, id: ObjectId) -> Option<&dyn ScriptObject> {
        entry_of(&self.slots, id).map(|entry| entry.object.as_ref())
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut dyn ScriptObject> {
        entry_of_mut(&mut self.slots, id).map(|entry| entry.object.as_mut())
    }

    pub fn object_as<T: ScriptObject>(&self, id: ObjectId) -> Option<&T> {
        self.object(id)?.as_any().downcast_ref()
    }

    pub fn object_as_mut<T: ScriptObject>(&mut self, id: ObjectId) -> Option<&mut T> {
        self.object_mut(id)?.as_any_mut().downcast_mut()
    }

    pub fn runtime_graph(&self, id: ObjectId, class: &str) -> Option<&RuntimeGraph> {
        entry_of(&self.slots, id)?.graphs.get(class)
    }

    /// Runs `event` on the object.
    ///
    /// Nothing happens unless the object is a `declared` and either exposes
    /// `event` or has a graph for it somewhere in its chain. Otherwise the chain
    /// is walked most-derived first: a generated class whose graph has a start
    /// node for `event` runs it, a native class runs its own implementation, and
    /// anything else defers to the parent.
    pub fn dispatch_event(
        &mut self,
        id: ObjectId,
        declared: &str,
        event: &str,
        args: &EventArgs,
    ) -> Result<DispatchReport, DispatchError> {
        let entry = entry_of_mut(&mut self.slots, id).ok_or(DispatchError::UnknownObject)?;
        let class = entry.object.class_name().to_string();

        let handles = entry.object.responds_to(event) || self.classes.graph_defines(&class, event);
        if !self.classes.is_a(&class, declared) || !handles {
            tracing::debug!("{id}: `{class}` as `{declared}` does not handle `{event}`, ignored");
            return Ok(DispatchReport::new(Handler::NoOp, DispatchStatus::Completed));
        }

        let interpreter = Interpreter::new(&self.registry, &self.engine, &self.config);

        for info in self.classes.chain(&class) {
            let Some(blueprint) = &info.blueprint else {
                match entry.object.invoke_native(&info.name, event, args) {
                    NativeCall::Handled => {
                        tracing::debug!("{id}: `{event}` handled natively by `{}`", info.name);
                        return Ok(DispatchReport::new(
                            Handler::Native {
                                class: info.name.clone(),
                            },
                            DispatchStatus::Completed,
                        ));
                    }
                    NativeCall::Missing => continue,
                }
            };

            let runnable = blueprint
                .event(event)
                .is_some_and(|program| program.entry().is_some());
            let Some(graph) = entry.graphs.get_mut(&info.name).filter(|_| runnable) else {
                continue;
            };

            let mut report = DispatchReport::new(
                Handler::Graph {
                    class: info.name.clone(),
                },
                DispatchStatus::Completed,
            );
            let result = interpreter.run(
                graph,
                entry.object.as_mut(),
                &mut self.scheduler,
                event,
                args,
                &mut report.output,
            );
            if let Err(err) = &result {
                tracing::error!("{id}: `{event}` on `{}` aborted: {err}", info.name);
            }
            report.status = status_of(result);
            return Ok(report);
        }

        Err(DispatchError::NoImplementation {
            class,
            event: event.to_string(),
        })
    }

    /// Polls the latent scheduler once and resumes every chain whose condition
    /// completed.
    pub fn tick(&mut self, dt: f32) -> TickReport {
        let mut report = TickReport::default();
        let interpreter = Interpreter::new(&self.registry, &self.engine, &self.config);

        for ready in self.scheduler.poll(dt) {
            let owner = ready.owner;
            let class = ready.continuation.class.clone();
            let event = ready.continuation.frame.event.clone();

            let Some(entry) = entry_of_mut(&mut self.slots, owner) else {
                report.dropped += 1;
                continue;
            };
            let Some(graph) = entry.graphs.get_mut(&class) else {
                report.dropped += 1;
                continue;
            };

            let mut output = InterpreterOutput::default();
            let result = interpreter.resume(
                graph,
                entry.object.as_mut(),
                &mut self.scheduler,
                ready.continuation,
                &mut output,
            );
            if let Err(err) = &result {
                tracing::error!("{owner}: resumed `{event}` on `{class}` aborted: {err}");
            }

            report.resumed.push(Resumption {
                owner,
                class,
                event,
                status: status_of(result),
                output,
            });
        }

        report
    }
}
