use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of nodes one dispatch may execute, latent resumptions included.
    pub step_budget: usize,
    pub max_expr_operations: u64,
    pub max_expr_depth: usize,
    /// Record an `EnterNode` event for every executed node.
    pub trace_nodes: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            step_budget: 10_000,
            max_expr_operations: 10_000,
            max_expr_depth: 64,
            trace_nodes: true,
        }
    }
}
