use crate::{
    error::{Diagnostic, DiagnosticReason},
    expr::{Expression, ExpressionEngine},
    model::{EventGraph, GraphDefinition, NodeIndex, NodeRecord, ParamRecord, SlotIndex},
    object::ObjectId,
    registry::{CapabilityDescriptor, CapabilityId, CapabilityRegistry, ParamType},
    scope::Variables,
    value::Value,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A parameter binding after resolution.
#[derive(Debug, Clone)]
pub enum BoundParam {
    Literal(Value),
    /// Parsed once here, evaluated on every invocation.
    Expr(Expression),
}

#[derive(Debug, Clone)]
pub struct ReadyNode {
    pub capability: CapabilityId,
    pub params: Vec<BoundParam>,
    /// Indexed by output slot.
    pub successors: Vec<Option<NodeIndex>>,
}

#[derive(Debug, Clone)]
pub enum CompiledNode {
    Ready(ReadyNode),
    /// Reaching this node ends the branch silently.
    Inert,
}

impl CompiledNode {
    pub fn is_inert(&self) -> bool {
        matches!(self, CompiledNode::Inert)
    }
}

#[derive(Debug, Clone)]
pub struct EventProgram {
    pub nodes: Vec<CompiledNode>,
    pub start: Option<NodeIndex>,
    /// Set when the start entry itself is broken; dispatch falls through.
    pub inert: bool,
}

impl EventProgram {
    /// The node to start from, if this event can run at all. An inert start
    /// node makes the whole event fall through.
    pub fn entry(&self) -> Option<NodeIndex> {
        if self.inert {
            return None;
        }
        self.start
            .filter(|start| self.nodes.get(*start).is_some_and(|node| !node.is_inert()))
    }

    pub fn successor(&self, node: NodeIndex, slot: SlotIndex) -> Option<NodeIndex> {
        match self.nodes.get(node)? {
            CompiledNode::Ready(ready) => ready.successors.get(slot).copied().flatten(),
            CompiledNode::Inert => None,
        }
    }
}

/// Class-level result of building a [`GraphDefinition`]. Immutable and shared by
/// every object of the class.
#[derive(Debug, Clone, Default)]
pub struct CompiledBlueprint {
    pub events: BTreeMap<String, EventProgram>,
    pub variables: Variables,
}

impl CompiledBlueprint {
    pub fn defines(&self, event: &str) -> bool {
        self.events.contains_key(event)
    }

    pub fn event(&self, event: &str) -> Option<&EventProgram> {
        self.events.get(event)
    }
}

#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub blueprint: CompiledBlueprint,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolves every event of `def` against `registry`.
///
/// Never fails: problems become [`Diagnostic`]s and make the affected node (or
/// event) inert.
pub fn compile(
    def: &GraphDefinition,
    registry: &CapabilityRegistry,
    engine: &ExpressionEngine,
) -> BuildOutput {
    let mut diagnostics = Vec::new();
    let mut events = BTreeMap::new();

    for (event, graph) in def.node_graph.iter() {
        let start = def.start_nodes.get(event).copied().flatten();
        let program = compile_event(event, graph, start, registry, engine, &mut diagnostics);
        events.insert(event.clone(), program);
    }

    // A start entry without any graph gives dispatch nothing to run.
    for (event, start) in def.start_nodes.iter() {
        if let (Some(start), false) = (start, def.node_graph.contains_key(event)) {
            diagnostics.push(
                Diagnostic::new(event.clone(), DiagnosticReason::StartWithoutGraph(*start))
                    .with_node(*start),
            );
        }
    }

    for diagnostic in diagnostics.iter() {
        tracing::warn!("blueprint build: {diagnostic}");
    }

    BuildOutput {
        blueprint: CompiledBlueprint {
            events,
            variables: def.variables.clone(),
        },
        diagnostics,
    }
}

fn compile_event(
    event: &str,
    graph: &EventGraph,
    start: Option<NodeIndex>,
    registry: &CapabilityRegistry,
    engine: &ExpressionEngine,
    diagnostics: &mut Vec<Diagnostic>,
) -> EventProgram {
    let node_count = graph.nodes.len();
    let mut inert = false;

    if let Some(start) = start {
        if start >= node_count {
            diagnostics.push(
                Diagnostic::new(event, DiagnosticReason::StartNodeOutOfRange(start)).with_node(start),
            );
            inert = true;
        }
    }

    let mut nodes: Vec<CompiledNode> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(index, record)| {
            match compile_node(record, registry, engine) {
                Ok(node) => node,
                Err(reason) => {
                    diagnostics.push(Diagnostic::new(event, reason).with_node(index));
                    CompiledNode::Inert
                }
            }
        })
        .collect();

    // Destinations of links leaving inert nodes. Those links are dropped.
    let mut from_inert: BTreeSet<NodeIndex> = BTreeSet::new();

    for link in graph.links.iter() {
        let (from, to, slot) = (link.source(), link.destination(), link.slot());

        if from >= node_count || to >= node_count {
            let bad = if from >= node_count { from } else { to };
            let mut diagnostic = Diagnostic::new(event, DiagnosticReason::LinkOutOfRange(bad));
            if from < node_count {
                diagnostic = diagnostic.with_node(from);
            }
            diagnostics.push(diagnostic);
            continue;
        }

        let CompiledNode::Ready(node) = &mut nodes[from] else {
            from_inert.insert(to);
            continue;
        };
        let available = node.successors.len();
        match node.successors.get_mut(slot) {
            None => diagnostics.push(
                Diagnostic::new(event, DiagnosticReason::SlotOutOfRange { slot, available })
                    .with_node(from),
            ),
            Some(Some(_)) => diagnostics.push(
                Diagnostic::new(event, DiagnosticReason::SlotAlreadyLinked(slot)).with_node(from),
            ),
            Some(target) => *target = Some(to),
        }
    }

    mark_unreachable(event, &mut nodes, &from_inert, start, diagnostics);

    EventProgram {
        nodes,
        start: if inert { None } else { start },
        inert,
    }
}

/// Nodes reachable from `seeds` along accepted links of ready nodes.
fn reachable(
    nodes: &[CompiledNode],
    seeds: impl IntoIterator<Item = NodeIndex>,
) -> BTreeSet<NodeIndex> {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<NodeIndex> = seeds.into_iter().collect();

    while let Some(index) = stack.pop() {
        if !seen.insert(index) {
            continue;
        }
        if let Some(CompiledNode::Ready(node)) = nodes.get(index) {
            stack.extend(node.successors.iter().flatten().copied());
        }
    }

    seen
}

/// Marks ready nodes that can only be entered through an inert node.
///
/// A node stays live when it is reachable from the start node or from a root
/// (a ready node nothing links to). Among the rest, those downstream of a link
/// leaving an inert node are made inert, cycles included.
fn mark_unreachable(
    event: &str,
    nodes: &mut [CompiledNode],
    from_inert: &BTreeSet<NodeIndex>,
    start: Option<NodeIndex>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let linked: BTreeSet<NodeIndex> = nodes
        .iter()
        .filter_map(|node| match node {
            CompiledNode::Ready(ready) => Some(ready.successors.iter().flatten().copied()),
            CompiledNode::Inert => None,
        })
        .flatten()
        .chain(from_inert.iter().copied())
        .collect();

    let roots = (0..nodes.len())
        .filter(|index| !linked.contains(index) && !nodes[*index].is_inert());
    let live = reachable(nodes, start.into_iter().chain(roots));
    let stranded = reachable(nodes, from_inert.iter().copied());

    for index in stranded {
        if live.contains(&index) || nodes[index].is_inert() {
            continue;
        }
        nodes[index] = CompiledNode::Inert;
        diagnostics.push(
            Diagnostic::new(event, DiagnosticReason::UnreachableThroughInert).with_node(index),
        );
    }
}

fn compile_node(
    record: &NodeRecord,
    registry: &CapabilityRegistry,
    engine: &ExpressionEngine,
) -> Result<CompiledNode, DiagnosticReason> {
    let capability = registry
        .lookup(&record.node_function)
        .ok_or_else(|| DiagnosticReason::UnknownCapability(record.node_function.clone()))?;
    let descriptor = registry
        .get(capability)
        .ok_or_else(|| DiagnosticReason::UnknownCapability(record.node_function.clone()))?;

    let params = bind_params(record, descriptor, engine)?;

    Ok(CompiledNode::Ready(ReadyNode {
        capability,
        params,
        successors: vec![None; descriptor.output_count()],
    }))
}

fn bind_params(
    record: &NodeRecord,
    descriptor: &CapabilityDescriptor,
    engine: &ExpressionEngine,
) -> Result<Vec<BoundParam>, DiagnosticReason> {
    if record.params.len() != descriptor.params.len() {
        return Err(DiagnosticReason::ParamCountMismatch {
            expected: descriptor.params.len(),
            actual: record.params.len(),
        });
    }

    descriptor
        .params
        .iter()
        .zip(record.params.iter())
        .map(|(spec, param)| {
            let source = match param {
                ParamRecord::Expr { expr } => expr.as_str(),
                ParamRecord::Literal(Value::String(text)) if spec.ty != ParamType::String => {
                    text.as_str()
                }
                ParamRecord::Literal(value) => {
                    return spec
                        .ty
                        .coerce(value.clone())
                        .map(BoundParam::Literal)
                        .map_err(|message| DiagnosticReason::LiteralTypeMismatch {
                            param: spec.name.clone(),
                            message,
                        });
                }
            };

            engine
                .parse(source)
                .map(BoundParam::Expr)
                .map_err(|err| DiagnosticReason::ExpressionParse {
                    param: spec.name.clone(),
                    message: err.to_string(),
                })
        })
        .collect()
}

/// A compiled blueprint bound to one object.
///
/// Owned by the object's world entry; refers back to the object only through
/// its handle.
#[derive(Debug, Clone)]
pub struct RuntimeGraph {
    class: String,
    owner: ObjectId,
    blueprint: Arc<CompiledBlueprint>,
    pub variables: Variables,
}

impl RuntimeGraph {
    pub fn new(class: impl Into<String>, owner: ObjectId, blueprint: Arc<CompiledBlueprint>) -> Self {
        Self {
            class: class.into(),
            owner,
            variables: blueprint.variables.clone(),
            blueprint,
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    pub fn blueprint(&self) -> &Arc<CompiledBlueprint> {
        &self.blueprint
    }

    pub fn defines(&self, event: &str) -> bool {
        self.blueprint.defines(event)
    }

    pub fn entry(&self, event: &str) -> Option<NodeIndex> {
        self.blueprint.event(event)?.entry()
    }

    /// O(1) adjacency lookup.
    pub fn successor(&self, event: &str, node: NodeIndex, slot: SlotIndex) -> Option<NodeIndex> {
        self.blueprint.event(event)?.successor(node, slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CallContext, Invocation};
    use crate::error::CapabilityError;
    use serde_json::json;

    fn noop(_ctx: &mut CallContext<'_>) -> Result<Invocation, CapabilityError> {
        Ok(Invocation::unit())
    }

    fn registry() -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();
        registry
            .register_fn(
                CapabilityDescriptor::new("ApplyDamage")
                    .param("amount", ParamType::Int)
                    .slot("success", [true])
                    .slot("fail", [false]),
                noop,
            )
            .unwrap();
        registry
            .register_fn(CapabilityDescriptor::new("PlayEffect"), noop)
            .unwrap();
        registry
            .register_fn(
                CapabilityDescriptor::new("Say").param("text", ParamType::String),
                noop,
            )
            .unwrap();
        registry
    }

    fn build(json: serde_json::Value) -> BuildOutput {
        let def: GraphDefinition = serde_json::from_value(json).unwrap();
        compile(&def, &registry(), &ExpressionEngine::default())
    }

    #[test]
    fn builds_adjacency_by_slot() {
        let out = build(json!({
            "nodeGraph": {"onHit": {
                "nodes": [
                    {"nodeFunction": "ApplyDamage", "params": [10]},
                    {"nodeFunction": "PlayEffect"},
                    {"nodeFunction": "PlayEffect"}
                ],
                "links": [[0, 1, 0], [0, 2, 1]]
            }},
            "startNodes": {"onHit": 0}
        }));

        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
        let program = out.blueprint.event("onHit").unwrap();
        assert_eq!(program.entry(), Some(0));
        assert_eq!(program.successor(0, 0), Some(1));
        assert_eq!(program.successor(0, 1), Some(2));
        assert_eq!(program.successor(1, 0), None);
    }

    #[test]
    fn unknown_capability_makes_node_and_its_dependents_inert() {
        let out = build(json!({
            "nodeGraph": {"onHit": {
                "nodes": [
                    {"nodeFunction": "PlayEffect"},
                    {"nodeFunction": "Teleport", "params": [1]},
                    {"nodeFunction": "PlayEffect"},
                    {"nodeFunction": "PlayEffect"}
                ],
                "links": [[0, 1, 0], [1, 2, 0], [2, 3, 0]]
            }},
            "startNodes": {"onHit": 0}
        }));

        let program = out.blueprint.event("onHit").unwrap();
        assert!(!program.inert);
        assert!(!program.nodes[0].is_inert());
        assert!(program.nodes[1].is_inert());
        assert!(program.nodes[2].is_inert());
        assert!(program.nodes[3].is_inert());

        assert_eq!(
            out.diagnostics[0],
            Diagnostic::new(
                "onHit",
                DiagnosticReason::UnknownCapability("Teleport".to_string())
            )
            .with_node(1)
        );
        assert!(out
            .diagnostics
            .iter()
            .any(|d| d.node == Some(3) && d.reason == DiagnosticReason::UnreachableThroughInert));
    }

    #[test]
    fn fan_in_keeps_node_alive_when_one_source_is_live() {
        let out = build(json!({
            "nodeGraph": {"onHit": {
                "nodes": [
                    {"nodeFunction": "ApplyDamage", "params": [1]},
                    {"nodeFunction": "Missing"},
                    {"nodeFunction": "PlayEffect"}
                ],
                "links": [[0, 2, 0], [1, 2, 0]]
            }},
            "startNodes": {"onHit": 0}
        }));

        let program = out.blueprint.event("onHit").unwrap();
        assert!(!program.nodes[2].is_inert());
        assert_eq!(out.diagnostics.len(), 1);
    }

    #[test]
    fn start_node_outside_the_list_makes_event_inert() {
        let out = build(json!({
            "nodeGraph": {"onHit": {"nodes": [{"nodeFunction": "PlayEffect"}], "links": []}},
            "startNodes": {"onHit": 4}
        }));

        let program = out.blueprint.event("onHit").unwrap();
        assert!(program.inert);
        assert_eq!(program.entry(), None);
        assert_eq!(
            out.diagnostics,
            vec![Diagnostic::new("onHit", DiagnosticReason::StartNodeOutOfRange(4)).with_node(4)]
        );
    }

    #[test]
    fn inert_start_node_makes_event_fall_through() {
        let out = build(json!({
            "nodeGraph": {"onHit": {
                "nodes": [{"nodeFunction": "Teleport"}, {"nodeFunction": "PlayEffect"}],
                "links": [[0, 1, 0]]
            }},
            "startNodes": {"onHit": 0}
        }));

        let program = out.blueprint.event("onHit").unwrap();
        assert!(!program.inert);
        assert_eq!(program.start, Some(0));
        assert_eq!(program.entry(), None);
        assert!(program.nodes[1].is_inert());
    }

    #[test]
    fn start_entry_without_graph_has_its_own_reason() {
        let out = build(json!({
            "nodeGraph": {},
            "startNodes": {"onHit": 2}
        }));

        assert_eq!(
            out.diagnostics,
            vec![Diagnostic::new("onHit", DiagnosticReason::StartWithoutGraph(2)).with_node(2)]
        );
    }

    #[test]
    fn rejected_links_do_not_keep_a_node_alive() {
        let out = build(json!({
            "nodeGraph": {"onHit": {
                "nodes": [
                    {"nodeFunction": "PlayEffect"},
                    {"nodeFunction": "Missing"},
                    {"nodeFunction": "PlayEffect"}
                ],
                "links": [[1, 2, 0], [0, 2, 5]]
            }},
            "startNodes": {"onHit": 0}
        }));

        let program = out.blueprint.event("onHit").unwrap();
        assert!(program.nodes[2].is_inert());
        assert!(out
            .diagnostics
            .iter()
            .any(|d| d.node == Some(2) && d.reason == DiagnosticReason::UnreachableThroughInert));
    }

    #[test]
    fn cycle_entered_only_through_inert_node_is_marked() {
        let out = build(json!({
            "nodeGraph": {"onHit": {
                "nodes": [
                    {"nodeFunction": "PlayEffect"},
                    {"nodeFunction": "Missing"},
                    {"nodeFunction": "PlayEffect"},
                    {"nodeFunction": "PlayEffect"}
                ],
                "links": [[1, 2, 0], [2, 3, 0], [3, 2, 0]]
            }},
            "startNodes": {"onHit": 0}
        }));

        let program = out.blueprint.event("onHit").unwrap();
        assert!(!program.nodes[0].is_inert());
        assert!(program.nodes[2].is_inert());
        assert!(program.nodes[3].is_inert());
        assert_eq!(out.diagnostics.len(), 3);
    }

    #[test]
    fn unlinked_roots_are_not_marked() {
        let out = build(json!({
            "nodeGraph": {"onHit": {
                "nodes": [
                    {"nodeFunction": "PlayEffect"},
                    {"nodeFunction": "PlayEffect"},
                    {"nodeFunction": "PlayEffect"}
                ],
                "links": [[1, 2, 0]]
            }},
            "startNodes": {"onHit": 0}
        }));

        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn bad_links_are_reported_and_dropped() {
        let out = build(json!({
            "nodeGraph": {"onHit": {
                "nodes": [
                    {"nodeFunction": "ApplyDamage", "params": [1]},
                    {"nodeFunction": "PlayEffect"},
                    {"nodeFunction": "PlayEffect"}
                ],
                "links": [[0, 9, 0], [0, 1, 5], [0, 1, 0], [0, 2, 0]]
            }},
            "startNodes": {"onHit": 0}
        }));

        let reasons: Vec<_> = out.diagnostics.iter().map(|d| d.reason.clone()).collect();
        assert_eq!(
            reasons,
            vec![
                DiagnosticReason::LinkOutOfRange(9),
                DiagnosticReason::SlotOutOfRange {
                    slot: 5,
                    available: 2
                },
                DiagnosticReason::SlotAlreadyLinked(0),
            ]
        );
        let program = out.blueprint.event("onHit").unwrap();
        assert_eq!(program.successor(0, 0), Some(1));
    }

    #[test]
    fn string_params_are_expressions_unless_declared_string() {
        let out = build(json!({
            "nodeGraph": {"onHit": {
                "nodes": [
                    {"nodeFunction": "ApplyDamage", "params": ["level * 2"]},
                    {"nodeFunction": "Say", "params": ["level * 2"]},
                    {"nodeFunction": "Say", "params": [{"expr": "name"}]}
                ],
                "links": []
            }},
            "startNodes": {"onHit": 0}
        }));

        assert!(out.diagnostics.is_empty());
        let program = out.blueprint.event("onHit").unwrap();
        let params = |i: usize| match &program.nodes[i] {
            CompiledNode::Ready(node) => node.params.clone(),
            CompiledNode::Inert => panic!("node {i} is inert"),
        };
        assert!(matches!(&params(0)[0], BoundParam::Expr(e) if e.source() == "level * 2"));
        assert!(matches!(&params(1)[0], BoundParam::Literal(Value::String(s)) if s == "level * 2"));
        assert!(matches!(&params(2)[0], BoundParam::Expr(_)));
    }

    #[test]
    fn literal_and_parse_errors_are_diagnostics() {
        let out = build(json!({
            "nodeGraph": {"onHit": {
                "nodes": [
                    {"nodeFunction": "ApplyDamage", "params": [true]},
                    {"nodeFunction": "ApplyDamage", "params": ["x = = 1"]},
                    {"nodeFunction": "ApplyDamage", "params": []}
                ],
                "links": []
            }},
            "startNodes": {"onHit": 0}
        }));

        assert!(matches!(
            out.diagnostics[0].reason,
            DiagnosticReason::LiteralTypeMismatch { .. }
        ));
        assert!(matches!(
            out.diagnostics[1].reason,
            DiagnosticReason::ExpressionParse { .. }
        ));
        assert_eq!(
            out.diagnostics[2].reason,
            DiagnosticReason::ParamCountMismatch {
                expected: 1,
                actual: 0
            }
        );
    }

    #[test]
    fn runtime_graphs_copy_initial_variables() {
        let out = build(json!({
            "nodeGraph": {},
            "variables": {"ammo": 3}
        }));
        let blueprint = Arc::new(out.blueprint);
        let mut a = RuntimeGraph::new("Enemy", ObjectId::from_raw(0, 0), blueprint.clone());
        let b = RuntimeGraph::new("Enemy", ObjectId::from_raw(1, 0), blueprint);

        a.variables.insert("ammo".to_string(), Value::Int(0));
        assert_eq!(b.variables.get("ammo"), Some(&Value::Int(3)));
    }
}
