//! Scene Warden replay CLI
//!
//! Usage:
//!   scene-warden [OPTIONS] <SCENE> <SCRIPT>
//!
//! Loads a scene plan and a command script from TOML, replays each command
//! through the validation engine, and prints the per-command verdicts along
//! with any side-effect commands the rules issued.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use glam::{DQuat, DVec3};
use serde::Deserialize;

use scene_warden::collision::NullChecker;
use scene_warden::hooks::{MessageKey, NullBuilder, Presentation};
use scene_warden::scene::{keys, Aabb, Command, Entity, EntityId, PropValue, ScaleRestriction};
use scene_warden::{Engine, EngineConfig, Profile, SceneGraph};

#[derive(Parser)]
#[command(name = "scene-warden")]
#[command(about = "Replay mutation commands through the scene validation engine")]
struct Cli {
    /// Scene plan (TOML)
    scene: PathBuf,

    /// Command script (TOML)
    script: PathBuf,

    /// Tuning profile (TOML)
    #[arg(short, long)]
    profile: Option<PathBuf>,

    /// Enable rule-chain debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Deserialize)]
struct ScenePlan {
    #[serde(default)]
    entities: Vec<EntityPlan>,
}

#[derive(Deserialize)]
struct EntityPlan {
    id: u32,
    parent: Option<u32>,
    position: Option<[f64; 3]>,
    yaw_deg: Option<f64>,
    scale: Option<[f64; 3]>,
    size: Option<[f64; 3]>,
    #[serde(default)]
    shadow: bool,
    #[serde(default)]
    model: bool,
    #[serde(default)]
    zone: bool,
    kit: Option<u32>,
    template: Option<u32>,
    #[serde(default)]
    props: HashMap<String, HashMap<String, toml::Value>>,
}

#[derive(Deserialize)]
struct CommandScript {
    #[serde(default)]
    commands: Vec<CommandPlan>,
}

#[derive(Deserialize)]
struct CommandPlan {
    kind: String,
    entity: u32,
    parent: Option<u32>,
    start: Option<[f64; 3]>,
    end: Option<[f64; 3]>,
    position: Option<[f64; 3]>,
    yaw_deg: Option<f64>,
    start_scale: Option<[f64; 3]>,
    new_scale: Option<[f64; 3]>,
    drag: Option<[f64; 3]>,
    restriction: Option<String>,
    #[serde(default)]
    transient: bool,
}

/// Presentation surface for replay runs: prints message tokens and
/// auto-accepts every confirmation.
struct ConsolePresentation;

impl Presentation for ConsolePresentation {
    fn status(&self, key: MessageKey) {
        println!("  [status] {}", key.token());
    }

    fn popup(&self, key: MessageKey) {
        println!("  [popup]  {}", key.token());
    }

    fn confirm(&self, key: MessageKey) -> bool {
        println!("  [confirm] {} -> accepted", key.token());
        true
    }
}

fn vec3(v: Option<[f64; 3]>) -> DVec3 {
    v.map(DVec3::from_array).unwrap_or(DVec3::ZERO)
}

fn prop_value(value: &toml::Value) -> Option<PropValue> {
    match value {
        toml::Value::Boolean(b) => Some(PropValue::Bool(*b)),
        toml::Value::Integer(i) => Some(PropValue::Int(*i)),
        toml::Value::Float(f) => Some(PropValue::Float(*f)),
        toml::Value::String(s) => Some(PropValue::Text(s.clone())),
        toml::Value::Array(items) => {
            if items.iter().all(|i| i.is_str()) {
                Some(PropValue::TextList(
                    items
                        .iter()
                        .filter_map(|i| i.as_str().map(str::to_string))
                        .collect(),
                ))
            } else {
                let floats: Vec<f64> = items
                    .iter()
                    .filter_map(|i| i.as_float().or_else(|| i.as_integer().map(|n| n as f64)))
                    .collect();
                if floats.len() == items.len() {
                    Some(PropValue::FloatList(floats))
                } else {
                    None
                }
            }
        }
        _ => None,
    }
}

fn build_entity(plan: &EntityPlan) -> Entity {
    let mut entity = Entity::new(EntityId(plan.id));
    entity.parent = plan.parent.map(EntityId);
    entity.position = vec3(plan.position);
    if let Some(yaw) = plan.yaw_deg {
        entity.rotation = DQuat::from_axis_angle(DVec3::Y, yaw.to_radians());
    }
    if let Some(scale) = plan.scale {
        entity.scale = DVec3::from_array(scale);
    }
    if let Some(size) = plan.size {
        let half = DVec3::from_array(size) * 0.5;
        entity.bounds = Aabb::new(-half, half);
    }
    entity.shadow = plan.shadow;
    entity.model = plan.model;
    entity.zone = plan.zone;
    entity.kit = plan.kit.map(EntityId);
    entity.template = plan.template.map(EntityId);

    for (sheet, values) in &plan.props {
        for (name, value) in values {
            match (keys::lookup(sheet, name), prop_value(value)) {
                (Some(key), Some(prop)) => entity.set_prop(key, prop),
                _ => eprintln!(
                    "warning: ignoring unknown property {}.{} on entity #{}",
                    sheet, name, plan.id
                ),
            }
        }
    }
    entity
}

fn restriction(tag: Option<&str>) -> Result<ScaleRestriction, String> {
    match tag.unwrap_or("none") {
        "none" => Ok(ScaleRestriction::None),
        "x" => Ok(ScaleRestriction::XAxis),
        "y" => Ok(ScaleRestriction::YAxis),
        "z" => Ok(ScaleRestriction::ZAxis),
        "xy" => Ok(ScaleRestriction::XyPlane),
        "xz" => Ok(ScaleRestriction::XzPlane),
        "yz" => Ok(ScaleRestriction::YzPlane),
        "uniform" => Ok(ScaleRestriction::Uniform),
        other => Err(format!("unknown scale restriction '{}'", other)),
    }
}

fn build_command(plan: &CommandPlan) -> Result<Command, String> {
    let entity = EntityId(plan.entity);
    let parent = plan.parent.map(EntityId);
    let rotation = plan
        .yaw_deg
        .map(|yaw| DQuat::from_axis_angle(DVec3::Y, yaw.to_radians()))
        .unwrap_or(DQuat::IDENTITY);

    match plan.kind.as_str() {
        "add" => Ok(Command::Add {
            entity,
            position: vec3(plan.position),
            rotation,
            transient: plan.transient,
            bypass_rules: false,
        }),
        "add-child" => Ok(Command::AddChild {
            entity,
            parent: parent.ok_or("add-child requires 'parent'")?,
            position: vec3(plan.position),
            rotation,
            transient: plan.transient,
            bypass_rules: false,
        }),
        "move" => Ok(Command::Move {
            entity,
            start: vec3(plan.start),
            end: vec3(plan.end),
            transient: plan.transient,
        }),
        "scale" => Ok(Command::Scale {
            entity,
            start_scale: plan.start_scale.map(DVec3::from_array).unwrap_or(DVec3::ONE),
            new_scale: plan.new_scale.map(DVec3::from_array).unwrap_or(DVec3::ONE),
            position: vec3(plan.position),
            drag: plan.drag.map(DVec3::from_array).unwrap_or(DVec3::ONE),
            restriction: restriction(plan.restriction.as_deref())?,
            transient: plan.transient,
        }),
        "rotate" => Ok(Command::Rotate {
            entity,
            rotation,
            transient: plan.transient,
        }),
        "transition-child" => Ok(Command::TransitionChild {
            entity,
            new_parent: parent.ok_or("transition-child requires 'parent'")?,
            position: vec3(plan.position),
            transient: plan.transient,
        }),
        "remove" => Ok(Command::Remove {
            entity,
            bypass_rules: false,
        }),
        "remove-child" => Ok(Command::RemoveChild {
            entity,
            parent: parent.ok_or("remove-child requires 'parent'")?,
            bypass_rules: false,
        }),
        "select" => Ok(Command::Select { entity }),
        other => Err(format!("unknown command kind '{}'", other)),
    }
}

fn load<T: serde::de::DeserializeOwned>(path: &PathBuf, what: &str) -> Result<T, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {} '{}': {}", what, path.display(), e))?;
    toml::from_str(&content)
        .map_err(|e| format!("failed to parse {} '{}': {}", what, path.display(), e))
}

fn run(cli: Cli) -> Result<usize, String> {
    let profile = match &cli.profile {
        Some(path) => Profile::from_file(path)
            .map_err(|e| format!("failed to load profile '{}': {}", path.display(), e))?,
        None => Profile::default(),
    };

    let plan: ScenePlan = load(&cli.scene, "scene plan")?;
    let script: CommandScript = load(&cli.script, "command script")?;

    let mut graph = SceneGraph::new();
    for entity_plan in &plan.entities {
        graph
            .insert(build_entity(entity_plan))
            .map_err(|e| format!("scene plan error: {}", e))?;
    }

    let engine = Engine::with_config(EngineConfig::new().with_profile(profile));
    let mut checker = NullChecker::new();
    let builder = NullBuilder;
    let presenter = ConsolePresentation;

    let mut rejected = 0usize;
    println!(
        "{:<4} {:<17} {:<7} {:<9} {:<27} issued",
        "#", "kind", "entity", "verdict", "rollback"
    );
    for (index, command_plan) in script.commands.iter().enumerate() {
        let mut command =
            build_command(command_plan).map_err(|e| format!("command #{}: {}", index + 1, e))?;
        let verdict = engine
            .validate_with(&mut graph, &mut checker, &builder, &presenter, &mut command)
            .map_err(|e| format!("command #{}: {}", index + 1, e))?;

        if !verdict.approved() {
            rejected += 1;
        }
        println!(
            "{:<4} {:<17} {:<7} {:<9} {:<27} {}",
            index + 1,
            command.kind().to_string(),
            command.entity().to_string(),
            if verdict.approved() {
                "approved"
            } else {
                "rejected"
            },
            format!("{:?}", verdict.rollback()),
            verdict.issued().len(),
        );
        for issued in verdict.issued() {
            println!("       -> {} {}", issued.kind(), issued.entity());
        }
    }
    Ok(rejected)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_target(false)
            .init();
    }

    match run(cli) {
        Ok(rejected) => {
            if rejected > 0 {
                println!("{} command(s) rejected", rejected);
            }
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
    }
}
