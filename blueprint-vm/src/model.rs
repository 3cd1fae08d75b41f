//! Persisted, engine-agnostic graph description.
//!
//! This is the format produced by the graph editor and stored inside
//! `.blueprint` assets:
//!
//! ```json
//! { "nodeGraph": { "onHit": { "nodes": [ {"nodeFunction": "Print", "params": ["\"hi\""], "pos": [0, 0]} ],
//!                             "links": [] } },
//!   "startNodes": { "onHit": 0 } }
//! ```

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type NodeIndex = usize;
pub type SlotIndex = usize;

/// One parameter binding of a node.
///
/// A bare JSON value is a literal, except that a string bound to a parameter
/// whose declared type is not `String` is read as an expression.
/// `{"expr": "..."}` is always an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamRecord {
    Expr { expr: String },
    Literal(Value),
}

impl ParamRecord {
    pub fn expr(source: impl Into<String>) -> Self {
        Self::Expr {
            expr: source.into(),
        }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(rename = "nodeFunction")]
    pub node_function: String,
    #[serde(default)]
    pub params: Vec<ParamRecord>,
    /// Editor position. Carried through load/save untouched.
    #[serde(default)]
    pub pos: [f32; 2],
}

impl NodeRecord {
    pub fn new(node_function: impl Into<String>) -> Self {
        Self {
            node_function: node_function.into(),
            params: Vec::new(),
            pos: [0.0, 0.0],
        }
    }

    pub fn with_param(mut self, param: ParamRecord) -> Self {
        self.params.push(param);
        self
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.pos = [x, y];
        self
    }
}

/// A single exec edge: `source`'s output slot `slot` drives `destination`.
///
/// Serialized as `[source, destination, slot]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord(pub NodeIndex, pub NodeIndex, pub SlotIndex);

impl LinkRecord {
    pub fn source(&self) -> NodeIndex {
        self.0
    }

    pub fn destination(&self) -> NodeIndex {
        self.1
    }

    pub fn slot(&self) -> SlotIndex {
        self.2
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventGraph {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
}

impl EventGraph {
    pub fn add_node(&mut self, node: NodeRecord) -> NodeIndex {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn add_link(&mut self, source: NodeIndex, destination: NodeIndex, slot: SlotIndex) {
        self.links.push(LinkRecord(source, destination, slot));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDefinition {
    #[serde(rename = "nodeGraph", default)]
    pub node_graph: BTreeMap<String, EventGraph>,
    #[serde(rename = "startNodes", default)]
    pub start_nodes: BTreeMap<String, Option<NodeIndex>>,
    /// Initial values of the per-object graph variables.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, Value>,
}

impl GraphDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Returns the graph for `event`, creating an empty one on first use.
    pub fn event_mut(&mut self, event: &str) -> &mut EventGraph {
        self.node_graph.entry(event.to_string()).or_default()
    }

    pub fn set_start(&mut self, event: &str, node: Option<NodeIndex>) {
        self.start_nodes.insert(event.to_string(), node);
    }

    pub fn defines(&self, event: &str) -> bool {
        self.node_graph.contains_key(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_editor_payload() {
        let json = json!({
            "nodeGraph": {
                "onHit": {
                    "nodes": [
                        {"nodeFunction": "ApplyDamage", "params": [10], "pos": [12.0, -4.5]},
                        {"nodeFunction": "Print", "params": ["ouch"]},
                        {"nodeFunction": "Print", "params": [{"expr": "damage * 2"}]}
                    ],
                    "links": [[0, 1, 0]]
                }
            },
            "startNodes": {"onHit": 0, "onSpawn": null}
        });

        let def: GraphDefinition = serde_json::from_value(json).unwrap();
        let graph = &def.node_graph["onHit"];
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.nodes[0].params, vec![ParamRecord::literal(10)]);
        assert_eq!(graph.nodes[0].pos, [12.0, -4.5]);
        assert_eq!(graph.nodes[1].pos, [0.0, 0.0]);
        assert_eq!(graph.nodes[2].params, vec![ParamRecord::expr("damage * 2")]);
        assert_eq!(graph.links, vec![LinkRecord(0, 1, 0)]);
        assert_eq!(def.start_nodes["onHit"], Some(0));
        assert_eq!(def.start_nodes["onSpawn"], None);
    }

    #[test]
    fn position_survives_save_and_load() {
        let mut def = GraphDefinition::new();
        let graph = def.event_mut("onTick");
        let a = graph.add_node(NodeRecord::new("Print").at(100.0, 250.0));
        let b = graph.add_node(NodeRecord::new("Print").at(-3.0, 7.5));
        graph.add_link(a, b, 0);
        def.set_start("onTick", Some(a));

        let text = def.to_json().unwrap();
        let loaded = GraphDefinition::from_json(&text).unwrap();
        assert_eq!(loaded, def);
        assert_eq!(loaded.node_graph["onTick"].nodes[1].pos, [-3.0, 7.5]);
    }

    #[test]
    fn links_serialize_as_triples() {
        let text = serde_json::to_string(&LinkRecord(2, 5, 1)).unwrap();
        assert_eq!(text, "[2,5,1]");
    }
}
