//! Headless blueprint player.
//!
//! Loads `player.toml` and the `.blueprint` assets next to it, spawns the
//! configured actors and drives the tick loop, echoing `Print` output to a
//! fading screen log.

mod asset;
mod config;
mod gameplay;
mod screen_log;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use blueprint_vm::{
    register_builtins, Actor, CapabilityRegistry, DispatchStatus, EventArgs, ExecutionEvent,
    ObjectId, Value, World,
};

use crate::config::{ActorConfig, PlayerConfig};
use crate::screen_log::ScreenLog;

/// Blueprint player
#[derive(Parser, Debug)]
#[command(name = "blueprint-player")]
#[command(about = "Runs blueprint classes headlessly", long_about = None)]
struct Args {
    /// Path to the player configuration
    #[arg(short, long, default_value = "data/player.toml")]
    config: PathBuf,

    /// Number of ticks to run, overriding the configuration
    #[arg(long)]
    ticks: Option<u32>,

    /// Print the capability palette and exit
    #[arg(long)]
    list_capabilities: bool,
}

struct Game {
    config: PlayerConfig,
    world: World,
    actors: Vec<ObjectId>,
    screen_log: ScreenLog,
}

impl Game {
    fn load(config_path: &Path) -> Result<Self> {
        let config = PlayerConfig::load(config_path)
            .with_context(|| format!("loading {}", config_path.display()))?;

        let mut registry = CapabilityRegistry::new();
        register_builtins(&mut registry)?;
        gameplay::register_gameplay(&mut registry)?;

        let mut world = World::new(config.runtime.clone(), registry);
        for class in config.native_classes.iter() {
            world.register_native_class(&class.name, class.parent.as_deref())?;
        }

        let root = config_path.parent().unwrap_or_else(|| Path::new("."));
        let blueprint_dir = root.join(&config.player.blueprints);
        let assets = asset::load_dir(&blueprint_dir)?;
        info!("Loaded {} blueprint(s) from {}", assets.len(), blueprint_dir.display());
        let diagnostics = asset::register_all(&mut world, assets)?;
        if diagnostics > 0 {
            warn!("{diagnostics} build diagnostic(s); affected events are inert");
        }

        let screen_log = ScreenLog::new(config.screen_log.ttl, config.screen_log.max_lines);

        Ok(Self {
            config,
            world,
            actors: Vec::new(),
            screen_log,
        })
    }

    fn spawn(&mut self, actor: &ActorConfig) -> Result<ObjectId> {
        let mut object = Actor::new(actor.class.clone());
        for (name, value) in actor.fields.iter() {
            object = object.with_field(name.clone(), value.clone());
        }
        for event in actor.exposes.iter() {
            object = object.exposes(event.clone());
        }
        let natives: Vec<String> = self
            .world
            .classes()
            .chain(&actor.class)
            .filter(|info| !info.is_generated())
            .map(|info| info.name.clone())
            .collect();
        for native in natives.iter() {
            object = gameplay::with_native_behaviour(object, native);
        }

        let id = self.world.spawn(object)?;
        info!("Spawned {} as {id}", actor.class);
        Ok(id)
    }

    fn dispatch(&mut self, id: ObjectId, event: &str, args: &EventArgs) {
        let Some(class) = self.world.object(id).map(|o| o.class_name().to_string()) else {
            return;
        };
        match self.world.dispatch_event(id, &class, event, args) {
            Ok(report) => {
                if let DispatchStatus::Aborted(err) = &report.status {
                    warn!("{id}: `{event}` aborted: {err}");
                }
                self.flush_events(report.output.events);
            }
            Err(err) => error!("{id}: `{event}` failed: {err}"),
        }
    }

    fn flush_events(&mut self, events: Vec<ExecutionEvent>) {
        for event in events {
            match event {
                ExecutionEvent::Print(text) => self.screen_log.push(text),
                ExecutionEvent::EnterNode(_)
                | ExecutionEvent::Suspended { .. }
                | ExecutionEvent::Resumed { .. } => {}
            }
        }
    }

    fn start(&mut self) -> Result<()> {
        let actors = self.config.actors.clone();
        let spawn_events = self.config.player.spawn_events.clone();
        for actor in actors.iter() {
            let id = self.spawn(actor)?;
            self.actors.push(id);
            for event in spawn_events.iter() {
                self.dispatch(id, event, &EventArgs::new());
            }
        }
        Ok(())
    }

    fn update(&mut self, dt: f32) {
        let tick_event = self.config.player.tick_event.clone();
        let mut args = EventArgs::new();
        args.insert("dt".to_string(), Value::Float(f64::from(dt)));

        for id in self.actors.clone() {
            self.dispatch(id, &tick_event, &args);
        }

        let report = self.world.tick(dt);
        if report.dropped > 0 {
            warn!("{} continuation(s) outlived their owner", report.dropped);
        }
        for resumption in report.resumed {
            if let DispatchStatus::Aborted(err) = &resumption.status {
                warn!("{}: resumed `{}` aborted: {err}", resumption.owner, resumption.event);
            }
            self.flush_events(resumption.output.events);
        }
    }

    fn run(&mut self, ticks: u32) -> Result<()> {
        self.start()?;
        let dt = self.config.player.dt();
        let mut shown = String::new();

        for tick in 0..ticks {
            self.update(dt);
            self.screen_log.update(dt);

            let text = self.screen_log.render();
            if text != shown {
                if self.screen_log.is_empty() {
                    info!("tick {tick}: screen cleared");
                } else {
                    info!("tick {tick}:\n{text}");
                }
                shown = text;
            }
        }

        info!(
            "Finished {ticks} tick(s), {} continuation(s) still pending",
            self.world.scheduler().len()
        );
        Ok(())
    }
}

fn list_capabilities() -> Result<()> {
    let mut registry = CapabilityRegistry::new();
    register_builtins(&mut registry)?;
    gameplay::register_gameplay(&mut registry)?;

    for category in registry.categories() {
        println!("{}", category.display_name());
        for descriptor in registry.in_category(category) {
            let params: Vec<String> = descriptor
                .params
                .iter()
                .map(|p| format!("{}: {}", p.name, p.ty.name()))
                .collect();
            let latent = if descriptor.latent { " (latent)" } else { "" };
            println!(
                "  {}({}){latent} - {}",
                descriptor.id,
                params.join(", "),
                descriptor.description
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("blueprint_vm=info,blueprint_player=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if args.list_capabilities {
        return list_capabilities();
    }

    info!("Starting blueprint player v{}", env!("CARGO_PKG_VERSION"));
    let mut game = Game::load(&args.config)?;
    let ticks = args.ticks.unwrap_or(game.config.player.ticks);
    game.run(ticks)
}
