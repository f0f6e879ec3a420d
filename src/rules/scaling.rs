//! Scale correction: absolute size snapping with position recentring, and
//! axis/plane restriction handling.

use crate::error::EngineError;
use crate::hooks::MessageKey;
use crate::scene::{keys, Command, ScaleRestriction};

use super::result::Evaluation;
use super::snap::closest_value;
use super::RuleCtx;

/// Snap each permitted axis's scaled size to the entity's discrete size
/// list, recomputing the scale factor and recentring position by half the
/// size delta in the drag direction.
///
/// An entity flagged to ignore the offset (uniform-scale mode) keeps its
/// position untouched.
pub(crate) fn scale_size_snap(
    ctx: &mut RuleCtx<'_>,
    cmd: &mut Command,
    eval: &mut Evaluation,
) -> Result<(), EngineError> {
    let entity = ctx.graph.require(cmd.entity())?;
    let sizes = match entity.floats_prop(keys::SNAP_SIZES) {
        Some(v) if !v.is_empty() => v.to_vec(),
        _ => {
            eval.result = false;
            return Ok(());
        }
    };
    let ignore_offset = entity.flag(keys::IGNORE_SCALE_OFFSET);
    let base = entity.bounds.size();

    let (start_scale, mut new_scale, mut position, drag, restriction) = match *cmd {
        Command::Scale {
            start_scale,
            new_scale,
            position,
            drag,
            restriction,
            ..
        } => (start_scale, new_scale, position, drag, restriction),
        _ => {
            eval.result = false;
            return Ok(());
        }
    };

    let permitted = restriction.permitted();
    for axis in 0..3 {
        if !permitted[axis] || (new_scale[axis] - start_scale[axis]).abs() <= f64::EPSILON {
            continue;
        }
        let scaled_size = base[axis] * new_scale[axis];
        let snap_size = match closest_value(scaled_size, &sizes) {
            Some(s) => s,
            None => continue,
        };
        if base[axis] > f64::EPSILON {
            new_scale[axis] = snap_size / base[axis];
        }
        if !ignore_offset {
            let start_size = base[axis] * start_scale[axis];
            let sign = if drag[axis] < 0.0 { -1.0 } else { 1.0 };
            position[axis] += (snap_size - start_size) / 2.0 * sign;
        }
    }

    cmd.set_new_scale(new_scale);
    cmd.set_end_position(position);
    eval.result = true;
    Ok(())
}

/// Force non-permitted axes back to their starting scale; UNIFORM instead
/// couples all three axes to the single largest requested ratio.
pub(crate) fn scale_restriction(
    ctx: &mut RuleCtx<'_>,
    cmd: &mut Command,
    eval: &mut Evaluation,
) -> Result<(), EngineError> {
    let (start_scale, mut new_scale, restriction, transient) = match *cmd {
        Command::Scale {
            start_scale,
            new_scale,
            restriction,
            transient,
            ..
        } => (start_scale, new_scale, restriction, transient),
        _ => {
            eval.result = false;
            return Ok(());
        }
    };

    match restriction {
        ScaleRestriction::None => {
            eval.result = false;
            return Ok(());
        }
        ScaleRestriction::Uniform => {
            // The largest per-axis ratio wins; all three axes follow it,
            // preserving aspect ratio.
            let mut largest = 1.0f64;
            for axis in 0..3 {
                if start_scale[axis].abs() > f64::EPSILON {
                    let ratio = new_scale[axis] / start_scale[axis];
                    if ratio > largest {
                        largest = ratio;
                    }
                }
            }
            new_scale = start_scale * largest;
            // Status updates for the uniform correction are transient-only.
            if transient {
                ctx.presenter.status(MessageKey::ScaleAdjusted);
            }
        }
        _ => {
            let permitted = restriction.permitted();
            for axis in 0..3 {
                if !permitted[axis] {
                    new_scale[axis] = start_scale[axis];
                }
            }
        }
    }

    cmd.set_new_scale(new_scale);
    eval.result = true;
    Ok(())
}

#[cfg(test)]
mod tests {
    use glam::DVec3;

    use crate::collision::NullChecker;
    use crate::hooks::{NullBuilder, SilentPresentation};
    use crate::profile::Profile;
    use crate::scene::{Aabb, Entity, EntityId, PropValue, SceneGraph};

    use super::*;

    fn scale_cmd(start: DVec3, new: DVec3, restriction: ScaleRestriction) -> Command {
        Command::Scale {
            entity: EntityId(1),
            start_scale: start,
            new_scale: new,
            position: DVec3::ZERO,
            drag: DVec3::new(1.0, 1.0, 1.0),
            restriction,
            transient: false,
        }
    }

    fn graph_with_snapping_entity() -> SceneGraph {
        let mut g = SceneGraph::new();
        let mut e = Entity::new(EntityId(1));
        e.bounds = Aabb::new(DVec3::splat(-0.5), DVec3::splat(0.5)); // base size 1.0
        e.set_prop(keys::SNAP_SIZES, PropValue::FloatList(vec![1.0, 2.0, 4.0]));
        g.insert(e).unwrap();
        g
    }

    fn run<F>(graph: &mut SceneGraph, cmd: &mut Command, rule: F) -> Evaluation
    where
        F: Fn(&mut RuleCtx<'_>, &mut Command, &mut Evaluation) -> Result<(), EngineError>,
    {
        let mut checker = NullChecker::new();
        let builder = NullBuilder;
        let presenter = SilentPresentation;
        let profile = Profile::default();
        let mut ctx = RuleCtx {
            graph,
            checker: &mut checker,
            builder: &builder,
            presenter: &presenter,
            profile: &profile,
        };
        let mut eval = Evaluation::new();
        rule(&mut ctx, cmd, &mut eval).unwrap();
        eval
    }

    #[test]
    fn test_size_snap_recomputes_scale_factor() {
        let mut g = graph_with_snapping_entity();
        // Requested size 1.7 on x snaps up to 2.0 (upper-scan rule).
        let mut cmd = scale_cmd(DVec3::ONE, DVec3::new(1.7, 1.0, 1.0), ScaleRestriction::None);
        let eval = run(&mut g, &mut cmd, scale_size_snap);
        assert!(eval.result);
        let scale = cmd.new_scale().unwrap();
        assert!((scale.x - 2.0).abs() < 1e-12);
        assert_eq!(scale.y, 1.0);
    }

    #[test]
    fn test_size_snap_recenters_position_by_half_delta() {
        let mut g = graph_with_snapping_entity();
        let mut cmd = scale_cmd(DVec3::ONE, DVec3::new(1.7, 1.0, 1.0), ScaleRestriction::None);
        let eval = run(&mut g, &mut cmd, scale_size_snap);
        assert!(eval.result);
        // snap size 2.0, start size 1.0, drag positive: offset +0.5.
        let pos = cmd.end_position().unwrap();
        assert!((pos.x - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_size_snap_negative_drag_flips_offset() {
        let mut g = graph_with_snapping_entity();
        let mut cmd = Command::Scale {
            entity: EntityId(1),
            start_scale: DVec3::ONE,
            new_scale: DVec3::new(1.7, 1.0, 1.0),
            position: DVec3::ZERO,
            drag: DVec3::new(-1.0, 0.0, 0.0),
            restriction: ScaleRestriction::None,
            transient: false,
        };
        run(&mut g, &mut cmd, scale_size_snap);
        let pos = cmd.end_position().unwrap();
        assert!((pos.x - -0.5).abs() < 1e-12);
    }

    #[test]
    fn test_size_snap_ignore_offset_flag_keeps_position() {
        let mut g = graph_with_snapping_entity();
        g.get_mut(EntityId(1))
            .unwrap()
            .set_prop(keys::IGNORE_SCALE_OFFSET, PropValue::Bool(true));
        let mut cmd = scale_cmd(DVec3::ONE, DVec3::new(1.7, 1.0, 1.0), ScaleRestriction::None);
        run(&mut g, &mut cmd, scale_size_snap);
        assert_eq!(cmd.end_position().unwrap(), DVec3::ZERO);
    }

    #[test]
    fn test_size_snap_without_sizes_does_not_apply() {
        let mut g = SceneGraph::new();
        g.insert(Entity::new(EntityId(1))).unwrap();
        let mut cmd = scale_cmd(DVec3::ONE, DVec3::new(1.7, 1.0, 1.0), ScaleRestriction::None);
        let eval = run(&mut g, &mut cmd, scale_size_snap);
        assert!(!eval.result);
    }

    #[test]
    fn test_restriction_x_axis_pins_other_axes() {
        let mut g = graph_with_snapping_entity();
        let start = DVec3::new(1.0, 2.0, 3.0);
        let mut cmd = scale_cmd(start, DVec3::new(5.0, 6.0, 7.0), ScaleRestriction::XAxis);
        let eval = run(&mut g, &mut cmd, scale_restriction);
        assert!(eval.result);
        let scale = cmd.new_scale().unwrap();
        assert_eq!(scale.x, 5.0);
        assert_eq!(scale.y, start.y);
        assert_eq!(scale.z, start.z);
    }

    #[test]
    fn test_restriction_uniform_equalizes_ratios() {
        let mut g = graph_with_snapping_entity();
        let start = DVec3::new(1.0, 2.0, 4.0);
        let mut cmd = scale_cmd(start, DVec3::new(3.0, 2.0, 4.0), ScaleRestriction::Uniform);
        let eval = run(&mut g, &mut cmd, scale_restriction);
        assert!(eval.result);
        let scale = cmd.new_scale().unwrap();
        // Largest requested ratio is 3.0 on x; every axis follows it.
        for axis in 0..3 {
            assert!((scale[axis] / start[axis] - 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_restriction_none_does_not_apply() {
        let mut g = graph_with_snapping_entity();
        let mut cmd = scale_cmd(DVec3::ONE, DVec3::new(2.0, 2.0, 2.0), ScaleRestriction::None);
        let eval = run(&mut g, &mut cmd, scale_restriction);
        assert!(!eval.result);
        assert_eq!(cmd.new_scale().unwrap(), DVec3::new(2.0, 2.0, 2.0));
    }
}
