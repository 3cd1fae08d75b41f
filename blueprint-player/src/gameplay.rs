//! Gameplay capabilities and native class behaviour exposed by the player.

use blueprint_vm::{
    Actor, CapabilityDescriptor, CapabilityError, CapabilityRegistry, Invocation, NodeCategory,
    ParamType, RegistryError, ScriptObject, Value,
};

pub fn register_gameplay(registry: &mut CapabilityRegistry) -> Result<(), RegistryError> {
    registry.register_fn(
        CapabilityDescriptor::new("ApplyDamage")
            .category(NodeCategory::Gameplay)
            .description("Subtracts `amount` from the owner's hp unless it is invulnerable.")
            .param("amount", ParamType::Int)
            .slot("success", [true])
            .slot("fail", [false])
            .method(),
        |ctx| {
            let amount = ctx.int("amount")?;
            let object = ctx.object()?;
            if object.field("invulnerable") == Some(Value::Bool(true)) {
                return Ok(Invocation::Done(Value::Bool(false)));
            }
            let hp = object
                .field("hp")
                .and_then(|hp| hp.as_int())
                .ok_or_else(|| CapabilityError::UnknownField("hp".to_string()))?;
            object.set_field("hp", Value::Int(hp - amount))?;
            Ok(Invocation::Done(Value::Bool(true)))
        },
    )?;

    registry.register_fn(
        CapabilityDescriptor::new("PlayEffect")
            .category(NodeCategory::Gameplay)
            .description("Plays a named visual effect.")
            .param("effect", ParamType::String),
        |ctx| {
            let effect = ctx.string("effect")?.to_string();
            tracing::debug!("effect `{effect}`");
            ctx.print(format!("*{effect}*"));
            Ok(Invocation::unit())
        },
    )?;

    registry.register_fn(
        CapabilityDescriptor::new("IsAlive")
            .category(NodeCategory::Gameplay)
            .description("Continues on `alive` while the owner's hp is above zero.")
            .slot("alive", [true])
            .slot("dead", [false])
            .method(),
        |ctx| {
            let hp = ctx
                .object()?
                .field("hp")
                .and_then(|hp| hp.as_int())
                .unwrap_or(0);
            Ok(Invocation::Done(Value::Bool(hp > 0)))
        },
    )?;

    Ok(())
}

/// Attaches the Rust implementation of native class events to `actor`.
pub fn with_native_behaviour(actor: Actor, native_class: &str) -> Actor {
    match native_class {
        "Pawn" => actor.with_native("Pawn", "onHit", |fields, args| {
            let damage = args.get("damage").and_then(Value::as_int).unwrap_or(0);
            let hp = fields.get("hp").and_then(Value::as_int).unwrap_or(0);
            fields.insert("hp".to_string(), Value::Int(hp - damage));
            tracing::info!("Pawn took {damage} damage natively");
        }),
        _ => actor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprint_vm::{
        register_builtins, EventArgs, GraphDefinition, Handler, RuntimeConfig, World,
    };
    use serde_json::json;

    fn world() -> World {
        let mut registry = CapabilityRegistry::new();
        register_builtins(&mut registry).unwrap();
        register_gameplay(&mut registry).unwrap();
        World::new(RuntimeConfig::default(), registry)
    }

    #[test]
    fn damage_then_effect() {
        let mut world = world();
        let def: GraphDefinition = serde_json::from_value(json!({
            "nodeGraph": {"onHit": {
                "nodes": [
                    {"nodeFunction": "ApplyDamage", "params": ["damage"]},
                    {"nodeFunction": "PlayEffect", "params": ["sparks"]}
                ],
                "links": [[0, 1, 0]]
            }},
            "startNodes": {"onHit": 0}
        }))
        .unwrap();
        world.register_blueprint_class("Enemy", None, &def).unwrap();
        let id = world
            .spawn(Actor::new("Enemy").with_field("hp", 100))
            .unwrap();

        let mut args = EventArgs::new();
        args.insert("damage".to_string(), Value::Int(25));
        let report = world.dispatch_event(id, "Enemy", "onHit", &args).unwrap();

        assert_eq!(
            report.output.printed().collect::<Vec<_>>(),
            vec!["*sparks*"]
        );
        assert_eq!(world.object(id).unwrap().field("hp"), Some(Value::Int(75)));
    }

    #[test]
    fn pawn_handles_hits_natively() {
        let mut world = world();
        world.register_native_class("Pawn", None).unwrap();
        let id = world
            .spawn(with_native_behaviour(
                Actor::new("Pawn").with_field("hp", 10),
                "Pawn",
            ))
            .unwrap();

        let mut args = EventArgs::new();
        args.insert("damage".to_string(), Value::Int(4));
        let report = world.dispatch_event(id, "Pawn", "onHit", &args).unwrap();

        assert_eq!(
            report.handler,
            Handler::Native {
                class: "Pawn".to_string()
            }
        );
        assert_eq!(world.object(id).unwrap().field("hp"), Some(Value::Int(6)));
    }
}
