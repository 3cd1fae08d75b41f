//! Player configuration (`player.toml`).

use blueprint_vm::{RuntimeConfig, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub player: PlayerInfo,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub screen_log: ScreenLogConfig,
    /// Classes implemented in Rust, registered before any blueprint.
    #[serde(default, rename = "native_class")]
    pub native_classes: Vec<NativeClassConfig>,
    #[serde(default, rename = "actor")]
    pub actors: Vec<ActorConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerInfo {
    pub ticks: u32,
    /// Ticks per second; every tick advances time by `1 / tick_rate`.
    pub tick_rate: f32,
    /// Directory scanned for `.blueprint` assets, relative to the config file.
    pub blueprints: String,
    /// Dispatched once, in order, right after an actor spawns.
    pub spawn_events: Vec<String>,
    pub tick_event: String,
}

impl Default for PlayerInfo {
    fn default() -> Self {
        Self {
            ticks: 120,
            tick_rate: 60.0,
            blueprints: "blueprints".to_string(),
            spawn_events: vec!["onConstruct".to_string(), "onBeginPlay".to_string()],
            tick_event: "onTick".to_string(),
        }
    }
}

impl PlayerInfo {
    pub fn dt(&self) -> f32 {
        if self.tick_rate > 0.0 {
            1.0 / self.tick_rate
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenLogConfig {
    pub ttl: f32,
    pub max_lines: usize,
}

impl Default for ScreenLogConfig {
    fn default() -> Self {
        Self {
            ttl: crate::screen_log::ScreenLog::DEFAULT_TTL,
            max_lines: crate::screen_log::ScreenLog::MAX_LINES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeClassConfig {
    pub name: String,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    pub class: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    /// Events the actor answers natively even without a graph.
    #[serde(default)]
    pub exposes: Vec<String>,
}

impl PlayerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_config() {
        let config: PlayerConfig = toml::from_str(
            r#"
            [player]
            ticks = 30
            tick_rate = 30.0

            [runtime]
            step_budget = 500

            [[native_class]]
            name = "Pawn"

            [[actor]]
            class = "Enemy"
            fields = { hp = 100, name = "grunt" }
            exposes = ["onHit"]
            "#,
        )
        .unwrap();

        assert_eq!(config.player.ticks, 30);
        assert_eq!(config.player.tick_event, "onTick");
        assert_eq!(config.runtime.step_budget, 500);
        assert_eq!(config.runtime.max_expr_depth, 64);
        assert_eq!(config.native_classes[0].parent, None);
        assert_eq!(config.actors[0].fields["hp"], Value::Int(100));
        assert_eq!(config.actors[0].fields["name"], Value::from("grunt"));
        assert!((config.player.dt() - 1.0 / 30.0).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: PlayerConfig = toml::from_str("").unwrap();
        assert_eq!(config.player.spawn_events, vec!["onConstruct", "onBeginPlay"]);
        assert!(config.actors.is_empty());
        assert_eq!(config.screen_log.max_lines, 6);
    }
}
