//! Parent resolution: ambiguous-pick correction, permanent-parent
//! latching, and classification-based parent restrictions.

use crate::error::EngineError;
use crate::hooks::MessageKey;
use crate::scene::{keys, transform, Command, PropValue};

use super::result::{Evaluation, Rollback, Severity};
use super::RuleCtx;

/// When the pick could attach to more than one candidate parent, reparent
/// the command to the candidates' nearest common ancestor and recompute the
/// position in the ancestor's frame. No common ancestor leaves the command
/// unchanged.
pub(crate) fn shared_ancestor(
    ctx: &mut RuleCtx<'_>,
    cmd: &mut Command,
    eval: &mut Evaluation,
) -> Result<(), EngineError> {
    let candidates = ctx.checker.parent_candidates(ctx.graph, cmd);
    if candidates.len() <= 1 {
        eval.result = false;
        return Ok(());
    }
    let ancestor = match ctx.graph.nearest_common_ancestor(&candidates) {
        Some(a) => a,
        None => {
            eval.result = false;
            return Ok(());
        }
    };
    let current_parent = match cmd.parent() {
        Some(p) => p,
        None => {
            eval.result = false;
            return Ok(());
        }
    };
    let local = cmd.end_position().unwrap_or_default();
    let scene_point = transform::to_scene_frame(ctx.graph, current_parent, local);
    cmd.set_parent(ancestor);
    cmd.set_end_position(transform::to_local_frame(ctx.graph, ancestor, scene_point));
    eval.result = true;
    Ok(())
}

/// Reject re-parenting an entity away from its permanently bound parent.
///
/// Shadow placeholders are always exempt; they exist only to be replaced by
/// the real placement.
pub(crate) fn permanent_parent(
    ctx: &mut RuleCtx<'_>,
    cmd: &mut Command,
    eval: &mut Evaluation,
) -> Result<(), EngineError> {
    let entity = ctx.graph.require(cmd.entity())?;
    let target = match cmd.parent() {
        Some(p) => p,
        None => {
            eval.result = true;
            return Ok(());
        }
    };
    if entity.shadow
        || !entity.flag(keys::USES_PERMANENT_PARENT)
        || !entity.flag(keys::PERMANENT_PARENT_SET)
    {
        eval.result = true;
        return Ok(());
    }
    let bound = entity.int_prop(keys::PERMANENT_PARENT_ID);
    if bound == Some(target.0 as i64) {
        eval.result = true;
        return Ok(());
    }

    eval.result = false;
    eval.escalate(Severity::Severe);
    if !cmd.is_transient() {
        ctx.presenter.popup(MessageKey::PermanentParentViolation);
        eval.reject(Rollback::ResetToStartAllCommands);
    }
    Ok(())
}

/// Record the first successful parent binding for entities that use a
/// permanent parent. Runs at the end of the add chains, once the verdict is
/// known.
pub(crate) fn latch_permanent_parent(
    ctx: &mut RuleCtx<'_>,
    cmd: &mut Command,
    eval: &mut Evaluation,
) -> Result<(), EngineError> {
    let target = match cmd.parent() {
        Some(p) => p,
        None => {
            eval.result = false;
            return Ok(());
        }
    };
    if !eval.approved() || cmd.is_transient() {
        eval.result = false;
        return Ok(());
    }
    let entity = ctx.graph.require_mut(cmd.entity())?;
    if !entity.flag(keys::USES_PERMANENT_PARENT) || entity.flag(keys::PERMANENT_PARENT_SET) {
        eval.result = false;
        return Ok(());
    }
    entity.set_prop(keys::PERMANENT_PARENT_SET, PropValue::Bool(true));
    entity.set_prop(keys::PERMANENT_PARENT_ID, PropValue::Int(target.0 as i64));
    eval.result = true;
    Ok(())
}

/// Classification allow-list check: the candidate parent's classification
/// tags must overlap the entity's allowed set, compared case-insensitively.
/// A missing or empty list on either side means no restriction.
pub(crate) fn allowed_parent(
    ctx: &mut RuleCtx<'_>,
    cmd: &mut Command,
    eval: &mut Evaluation,
) -> Result<(), EngineError> {
    let entity = ctx.graph.require(cmd.entity())?;
    let target = match cmd.parent() {
        Some(p) => p,
        None => {
            eval.result = true;
            return Ok(());
        }
    };
    let allowed = match entity.texts_prop(keys::ALLOWED_PARENT_CLASSES) {
        Some(list) if !list.is_empty() => list.to_vec(),
        _ => {
            eval.result = true;
            return Ok(());
        }
    };
    let parent = ctx.graph.require(target)?;
    let classes = match parent.texts_prop(keys::CLASSIFICATION) {
        Some(list) if !list.is_empty() => list,
        _ => {
            eval.result = true;
            return Ok(());
        }
    };

    let matches = allowed
        .iter()
        .any(|a| classes.iter().any(|c| a.eq_ignore_ascii_case(c)));
    if matches {
        eval.result = true;
        return Ok(());
    }

    eval.result = false;
    eval.escalate(Severity::Severe);
    if !cmd.is_transient() {
        ctx.presenter.popup(MessageKey::RestrictedParent);
        eval.reject(Rollback::ResetToStartAllCommands);
    }
    Ok(())
}
