//! Replacement-collision response.
//!
//! A pending placement can match a "replace" relationship against existing
//! entities, a category distinct from illegal and expected collisions.
//! Transient commands are nudged clear by the largest configured depth
//! buffer; committed commands confirm, remove every matched entity, and
//! re-parent to the grandparent when the direct parent itself was replaced.

use glam::DVec3;

use crate::collision::CollisionClass;
use crate::error::EngineError;
use crate::hooks::MessageKey;
use crate::scene::{keys, transform, Command};

use super::result::Evaluation;
use super::{rollback_for, RuleCtx};

pub(crate) fn replacement(
    ctx: &mut RuleCtx<'_>,
    cmd: &mut Command,
    eval: &mut Evaluation,
) -> Result<(), EngineError> {
    if !matches!(
        cmd,
        Command::Add { .. } | Command::AddChild { .. } | Command::Move { .. }
    ) {
        eval.result = false;
        return Ok(());
    }
    let report = ctx.checker.check(ctx.graph, cmd);
    let matched: Vec<_> = report.of_class(CollisionClass::Replace).collect();
    if matched.is_empty() {
        eval.result = false;
        return Ok(());
    }

    if cmd.is_transient() {
        // Largest depth buffer among the matched entities wins; entities
        // without one fall back to the profile buffer.
        let mut buffer = 0.0f64;
        for id in &matched {
            let depth = ctx
                .graph
                .require(*id)?
                .float_prop(keys::DEPTH_BUFFER)
                .unwrap_or(ctx.profile.default_depth_buffer);
            if depth > buffer {
                buffer = depth;
            }
        }
        let facing = cmd
            .rotation()
            .unwrap_or(ctx.graph.require(cmd.entity())?.rotation);
        if let Some(end) = cmd.end_position() {
            cmd.set_end_position(end + facing * (DVec3::Z * buffer));
        }
        eval.result = true;
        return Ok(());
    }

    if !ctx.presenter.confirm(MessageKey::ReplaceConfirm) {
        eval.result = false;
        eval.reject(rollback_for(cmd));
        return Ok(());
    }

    for id in &matched {
        if !eval.removal_scheduled(*id) {
            eval.issue(Command::Remove {
                entity: *id,
                bypass_rules: true,
            });
        }
    }

    // If the direct parent is being replaced, the command climbs to the
    // grandparent and its position is recomputed in that frame.
    if let Some(parent) = cmd.parent() {
        if matched.contains(&parent) {
            if let Some(grandparent) = ctx.graph.require(parent)?.parent {
                let local = cmd.end_position().unwrap_or_default();
                let scene_point = transform::to_scene_frame(ctx.graph, parent, local);
                cmd.set_parent(grandparent);
                cmd.set_end_position(transform::to_local_frame(
                    ctx.graph,
                    grandparent,
                    scene_point,
                ));
            }
        }
    }
    eval.result = true;
    Ok(())
}
