//! Placement legality: zone containment, collision legality, and the
//! editability hint.

use crate::error::EngineError;
use crate::hooks::MessageKey;
use crate::scene::{keys, transform, Command};

use super::result::{Evaluation, Severity};
use super::{rollback_for, RuleCtx};

/// Scene-space end position of a positional command, resolving parent-local
/// payloads through the target parent's frame.
pub(crate) fn end_scene_position(
    graph: &crate::scene::SceneGraph,
    cmd: &Command,
) -> Option<glam::DVec3> {
    let position = cmd.end_position()?;
    match cmd {
        Command::AddChild { parent, .. } => {
            Some(transform::to_scene_frame(graph, *parent, position))
        }
        Command::TransitionChild { new_parent, .. } => {
            Some(transform::to_scene_frame(graph, *new_parent, position))
        }
        Command::Add { .. } | Command::Move { .. } => Some(position),
        _ => None,
    }
}

/// The entity's prospective bounds must stay inside its zone ancestor's
/// bounds. No zone in the ancestry means no restriction.
pub(crate) fn zone_bounds(
    ctx: &mut RuleCtx<'_>,
    cmd: &mut Command,
    eval: &mut Evaluation,
) -> Result<(), EngineError> {
    let scene_end = match end_scene_position(ctx.graph, cmd) {
        Some(p) => p,
        None => {
            eval.result = true;
            return Ok(());
        }
    };
    // The zone is looked up from the frame the entity will occupy.
    let frame = cmd.parent().unwrap_or_else(|| cmd.entity());
    let zone = match transform::zone_of(ctx.graph, frame) {
        Some(z) => z,
        None => {
            eval.result = true;
            return Ok(());
        }
    };

    let entity = ctx.graph.require(cmd.entity())?;
    let pending_box = transform::world_box_at(entity, scene_end);
    let zone_entity = ctx.graph.require(zone)?;
    let zone_box =
        transform::world_box_at(zone_entity, transform::scene_position(ctx.graph, zone));

    if zone_box.contains(&pending_box) {
        eval.result = true;
        return Ok(());
    }

    eval.result = false;
    eval.escalate(Severity::Severe);
    if !cmd.is_transient() {
        ctx.presenter.popup(MessageKey::OutOfBounds);
        eval.reject(rollback_for(cmd));
    }
    Ok(())
}

/// Reject placements whose collision report contains an illegal overlap,
/// or that touch nothing when the entity is not legal free-standing.
pub(crate) fn collision_legality(
    ctx: &mut RuleCtx<'_>,
    cmd: &mut Command,
    eval: &mut Evaluation,
) -> Result<(), EngineError> {
    let report = ctx.checker.check(ctx.graph, cmd);
    let zero_collision_illegal =
        report.is_empty() && !ctx.checker.legal_zero_collision(ctx.graph, cmd.entity());
    if !report.has_illegal() && !zero_collision_illegal {
        eval.result = true;
        return Ok(());
    }

    eval.result = false;
    eval.escalate(Severity::Severe);
    if !cmd.is_transient() {
        ctx.presenter.popup(MessageKey::IllegalPlacement);
        eval.reject(rollback_for(cmd));
    }
    Ok(())
}

/// Status-bar hint for entities that are not editable. Advisory only.
pub(crate) fn editable_hint(
    ctx: &mut RuleCtx<'_>,
    cmd: &mut Command,
    eval: &mut Evaluation,
) -> Result<(), EngineError> {
    let entity = ctx.graph.require(cmd.entity())?;
    if entity.bool_prop(keys::EDITABLE) == Some(false) {
        ctx.presenter.status(MessageKey::EntityLocked);
        eval.result = false;
    } else {
        eval.result = true;
    }
    Ok(())
}
