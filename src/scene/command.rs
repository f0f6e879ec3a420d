//! Mutation commands: the closed set of intents the rule chain validates.
//!
//! Each variant describes one mutation against the scene graph. Rules may
//! rewrite the fields exposed through the setters below (end position,
//! parent, scale, rotation) and may enqueue new commands on the evaluation
//! result; they never construct entities themselves.
//!
//! Position conventions: `Add` and `Move` positions are scene-space;
//! `AddChild` and `TransitionChild` positions are local to the target
//! parent's frame.

use std::fmt;

use glam::{DQuat, DVec3};

use super::entity::EntityId;

/// Which axes a scale command is permitted to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleRestriction {
    #[default]
    None,
    XAxis,
    YAxis,
    ZAxis,
    XyPlane,
    XzPlane,
    YzPlane,
    /// All axes move together, preserving aspect ratio.
    Uniform,
}

impl ScaleRestriction {
    /// Per-axis permission mask. `Uniform` permits all axes; the uniform
    /// coupling itself is applied by the scale-restriction rule.
    pub fn permitted(self) -> [bool; 3] {
        match self {
            ScaleRestriction::None | ScaleRestriction::Uniform => [true, true, true],
            ScaleRestriction::XAxis => [true, false, false],
            ScaleRestriction::YAxis => [false, true, false],
            ScaleRestriction::ZAxis => [false, false, true],
            ScaleRestriction::XyPlane => [true, true, false],
            ScaleRestriction::XzPlane => [true, false, true],
            ScaleRestriction::YzPlane => [false, true, true],
        }
    }
}

/// Coarse command kind, for chain selection and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Add,
    AddChild,
    Move,
    Scale,
    Rotate,
    TransitionChild,
    Remove,
    RemoveChild,
    Select,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Add => "add",
            CommandKind::AddChild => "add-child",
            CommandKind::Move => "move",
            CommandKind::Scale => "scale",
            CommandKind::Rotate => "rotate",
            CommandKind::TransitionChild => "transition-child",
            CommandKind::Remove => "remove",
            CommandKind::RemoveChild => "remove-child",
            CommandKind::Select => "select",
        };
        write!(f, "{}", name)
    }
}

/// One mutation intent against the scene graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Place an entity at the scene root.
    Add {
        entity: EntityId,
        position: DVec3,
        rotation: DQuat,
        transient: bool,
        bypass_rules: bool,
    },
    /// Place an entity under a parent.
    AddChild {
        entity: EntityId,
        parent: EntityId,
        position: DVec3,
        rotation: DQuat,
        transient: bool,
        bypass_rules: bool,
    },
    /// Move an entity from `start` to `end`, both scene-space.
    Move {
        entity: EntityId,
        start: DVec3,
        end: DVec3,
        transient: bool,
    },
    /// Rescale an entity. `position` is the entity position going in and
    /// may be rewritten by snap recentring. `drag` carries the signed
    /// per-axis direction the user is dragging.
    Scale {
        entity: EntityId,
        start_scale: DVec3,
        new_scale: DVec3,
        position: DVec3,
        drag: DVec3,
        restriction: ScaleRestriction,
        transient: bool,
    },
    Rotate {
        entity: EntityId,
        rotation: DQuat,
        transient: bool,
    },
    /// Combined reparent + move.
    TransitionChild {
        entity: EntityId,
        new_parent: EntityId,
        position: DVec3,
        transient: bool,
    },
    Remove {
        entity: EntityId,
        bypass_rules: bool,
    },
    RemoveChild {
        entity: EntityId,
        parent: EntityId,
        bypass_rules: bool,
    },
    Select {
        entity: EntityId,
    },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Add { .. } => CommandKind::Add,
            Command::AddChild { .. } => CommandKind::AddChild,
            Command::Move { .. } => CommandKind::Move,
            Command::Scale { .. } => CommandKind::Scale,
            Command::Rotate { .. } => CommandKind::Rotate,
            Command::TransitionChild { .. } => CommandKind::TransitionChild,
            Command::Remove { .. } => CommandKind::Remove,
            Command::RemoveChild { .. } => CommandKind::RemoveChild,
            Command::Select { .. } => CommandKind::Select,
        }
    }

    /// The entity this command operates on.
    pub fn entity(&self) -> EntityId {
        match *self {
            Command::Add { entity, .. }
            | Command::AddChild { entity, .. }
            | Command::Move { entity, .. }
            | Command::Scale { entity, .. }
            | Command::Rotate { entity, .. }
            | Command::TransitionChild { entity, .. }
            | Command::Remove { entity, .. }
            | Command::RemoveChild { entity, .. }
            | Command::Select { entity } => entity,
        }
    }

    /// In-progress interactive drag, as opposed to a committed action.
    pub fn is_transient(&self) -> bool {
        match *self {
            Command::Add { transient, .. }
            | Command::AddChild { transient, .. }
            | Command::Move { transient, .. }
            | Command::Scale { transient, .. }
            | Command::Rotate { transient, .. }
            | Command::TransitionChild { transient, .. } => transient,
            Command::Remove { .. } | Command::RemoveChild { .. } | Command::Select { .. } => false,
        }
    }

    /// Cascade-issued commands skip the rule chain entirely.
    pub fn bypasses_rules(&self) -> bool {
        match *self {
            Command::Add { bypass_rules, .. }
            | Command::AddChild { bypass_rules, .. }
            | Command::Remove { bypass_rules, .. }
            | Command::RemoveChild { bypass_rules, .. } => bypass_rules,
            _ => false,
        }
    }

    pub fn is_removal(&self) -> bool {
        matches!(self, Command::Remove { .. } | Command::RemoveChild { .. })
    }

    /// The positional payload rules may rewrite, if this command has one.
    pub fn end_position(&self) -> Option<DVec3> {
        match *self {
            Command::Add { position, .. }
            | Command::AddChild { position, .. }
            | Command::Scale { position, .. }
            | Command::TransitionChild { position, .. } => Some(position),
            Command::Move { end, .. } => Some(end),
            _ => None,
        }
    }

    pub fn set_end_position(&mut self, value: DVec3) {
        match self {
            Command::Add { position, .. }
            | Command::AddChild { position, .. }
            | Command::Scale { position, .. }
            | Command::TransitionChild { position, .. } => *position = value,
            Command::Move { end, .. } => *end = value,
            _ => {}
        }
    }

    /// The target parent, for commands that attach to one.
    pub fn parent(&self) -> Option<EntityId> {
        match *self {
            Command::AddChild { parent, .. } | Command::RemoveChild { parent, .. } => Some(parent),
            Command::TransitionChild { new_parent, .. } => Some(new_parent),
            _ => None,
        }
    }

    pub fn set_parent(&mut self, value: EntityId) {
        match self {
            Command::AddChild { parent, .. } => *parent = value,
            Command::TransitionChild { new_parent, .. } => *new_parent = value,
            _ => {}
        }
    }

    pub fn new_scale(&self) -> Option<DVec3> {
        match *self {
            Command::Scale { new_scale, .. } => Some(new_scale),
            _ => None,
        }
    }

    pub fn set_new_scale(&mut self, value: DVec3) {
        if let Command::Scale { new_scale, .. } = self {
            *new_scale = value;
        }
    }

    pub fn rotation(&self) -> Option<DQuat> {
        match *self {
            Command::Add { rotation, .. }
            | Command::AddChild { rotation, .. }
            | Command::Rotate { rotation, .. } => Some(rotation),
            _ => None,
        }
    }

    pub fn set_rotation(&mut self, value: DQuat) {
        match self {
            Command::Add { rotation, .. }
            | Command::AddChild { rotation, .. }
            | Command::Rotate { rotation, .. } => *rotation = value,
            _ => {}
        }
    }
}
