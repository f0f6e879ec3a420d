//! Snap resolution: closest-value search, incremental-step rounding, and
//! rotation-increment rounding, plus the move/rotate rules that apply them.
//!
//! The closest-value search is an upper-scan rule, not a nearest-distance
//! search: within range it returns the first candidate at or above the
//! target. Downstream offset math depends on that exact tie-break.

use glam::{DQuat, DVec3};

use crate::error::EngineError;
use crate::scene::{keys, Command};

use super::result::Evaluation;
use super::RuleCtx;

// ── Scalar resolvers ──────────────────────────────────────────────

/// Pick a snap value from an unordered candidate set.
///
/// Candidates are sorted ascending; a target below the minimum or above the
/// maximum clamps to that extreme, otherwise the first candidate >= target
/// wins. Returns `None` for an empty set (rule does not apply).
pub fn closest_value(target: f64, candidates: &[f64]) -> Option<f64> {
    if candidates.is_empty() {
        return None;
    }
    let mut sorted = candidates.to_vec();
    sorted.sort_by(f64::total_cmp);

    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    if target <= min {
        return Some(min);
    }
    if target >= max {
        return Some(max);
    }
    sorted.into_iter().find(|v| *v >= target)
}

/// Round a position to a multiple of `step`, resolving the over-half case
/// toward the signed direction of travel rather than the remainder.
///
/// A zero step short-circuits to zero without dividing.
pub fn incremental_snap(position: f64, step: f64, direction: f64) -> f64 {
    if step == 0.0 {
        return 0.0;
    }
    let mut index = (position / step).floor();
    let remainder = position - index * step;
    if remainder.abs() > step / 2.0 {
        index += if direction >= 0.0 { 1.0 } else { -1.0 };
    }
    index * step
}

/// Round an angle (radians) to a multiple of `increment`.
///
/// Same index/remainder technique as [`incremental_snap`], but the
/// remainder's own sign breaks the tie: rotation has no separate travel
/// vector to consult.
pub fn rotation_snap(angle: f64, increment: f64) -> f64 {
    if increment == 0.0 {
        return 0.0;
    }
    let mut index = (angle / increment).floor();
    let remainder = angle - index * increment;
    if remainder.abs() > increment / 2.0 {
        index += remainder.signum();
    }
    index * increment
}

// ── Rules ─────────────────────────────────────────────────────────

/// Gate: does this entity opt into snapping at all.
pub(crate) fn uses_snaps(
    ctx: &mut RuleCtx<'_>,
    cmd: &mut Command,
    eval: &mut Evaluation,
) -> Result<(), EngineError> {
    let entity = ctx.graph.require(cmd.entity())?;
    eval.result = entity.flag(keys::USES_SNAPS);
    Ok(())
}

/// Absolute positional snap against the entity's declared snap values.
///
/// Applies on each axis the command actually traveled.
pub(crate) fn absolute_move_snap(
    ctx: &mut RuleCtx<'_>,
    cmd: &mut Command,
    eval: &mut Evaluation,
) -> Result<(), EngineError> {
    let entity = ctx.graph.require(cmd.entity())?;
    let values = match entity.floats_prop(keys::SNAP_VALUES) {
        Some(v) if !v.is_empty() => v.to_vec(),
        _ => {
            eval.result = false;
            return Ok(());
        }
    };
    let (start, mut end) = match *cmd {
        Command::Move { start, end, .. } => (start, end),
        _ => {
            eval.result = false;
            return Ok(());
        }
    };

    for axis in 0..3 {
        if (end[axis] - start[axis]).abs() > ctx.profile.snap_epsilon {
            if let Some(v) = closest_value(end[axis], &values) {
                end[axis] = v;
            }
        }
    }
    cmd.set_end_position(end);
    eval.result = true;
    Ok(())
}

/// Incremental positional snap against the entity's declared step.
pub(crate) fn incremental_move_snap(
    ctx: &mut RuleCtx<'_>,
    cmd: &mut Command,
    eval: &mut Evaluation,
) -> Result<(), EngineError> {
    let entity = ctx.graph.require(cmd.entity())?;
    let step = match entity.float_prop(keys::SNAP_INCREMENT) {
        Some(s) if s > 0.0 => s,
        _ => {
            eval.result = false;
            return Ok(());
        }
    };
    let (start, mut end) = match *cmd {
        Command::Move { start, end, .. } => (start, end),
        _ => {
            eval.result = false;
            return Ok(());
        }
    };

    for axis in 0..3 {
        let travel = end[axis] - start[axis];
        if travel.abs() > ctx.profile.snap_epsilon {
            end[axis] = incremental_snap(end[axis], step, travel);
        }
    }
    cmd.set_end_position(end);
    eval.result = true;
    Ok(())
}

/// Snap a rotate command's yaw to the entity's rotation increment, falling
/// back to the profile increment.
///
/// Interactive rotation drives the up axis only; a rotation about any other
/// axis is left untouched.
pub(crate) fn rotation_snap_rule(
    ctx: &mut RuleCtx<'_>,
    cmd: &mut Command,
    eval: &mut Evaluation,
) -> Result<(), EngineError> {
    let entity = ctx.graph.require(cmd.entity())?;
    let increment = entity
        .float_prop(keys::ROTATION_INCREMENT)
        .map(f64::to_radians)
        .unwrap_or_else(|| ctx.profile.rotation_increment());
    if increment <= 0.0 {
        eval.result = false;
        return Ok(());
    }
    let rotation = match *cmd {
        Command::Rotate { rotation, .. } => rotation,
        _ => {
            eval.result = false;
            return Ok(());
        }
    };

    let (axis, angle) = rotation.to_axis_angle();
    let yaw = if angle.abs() < 1e-12 {
        0.0
    } else if axis.dot(DVec3::Y).abs() > 0.999 {
        angle * axis.y.signum()
    } else {
        eval.result = false;
        return Ok(());
    };

    let snapped = rotation_snap(yaw, increment);
    cmd.set_rotation(DQuat::from_axis_angle(DVec3::Y, snapped));
    eval.result = true;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── closest_value ──

    #[test]
    fn test_closest_value_upper_scan() {
        // 0.05 sits strictly between 0 and 0.1; the scan rule picks the
        // upper bound even though 0 is nearer by distance.
        assert_eq!(closest_value(0.05, &[0.0, 0.1, 0.2]), Some(0.1));
    }

    #[test]
    fn test_closest_value_clamps_below_min() {
        assert_eq!(closest_value(-1.0, &[0.0, 0.1, 0.2]), Some(0.0));
    }

    #[test]
    fn test_closest_value_clamps_above_max() {
        assert_eq!(closest_value(5.0, &[0.0, 0.1, 0.2]), Some(0.2));
    }

    #[test]
    fn test_closest_value_exact_member() {
        assert_eq!(closest_value(0.1, &[0.0, 0.1, 0.2]), Some(0.1));
    }

    #[test]
    fn test_closest_value_unsorted_input() {
        assert_eq!(closest_value(0.15, &[0.2, 0.0, 0.1]), Some(0.2));
    }

    #[test]
    fn test_closest_value_empty_set() {
        assert_eq!(closest_value(0.5, &[]), None);
    }

    #[test]
    fn test_closest_value_result_is_member() {
        let set = [0.03, 0.7, 0.12, 0.4];
        for target in [-2.0, 0.0, 0.1, 0.3, 0.5, 0.9] {
            let v = closest_value(target, &set).unwrap();
            assert!(set.contains(&v));
        }
    }

    // ── incremental_snap ──

    #[test]
    fn test_incremental_snap_under_half_keeps_index() {
        // 0.074 / 0.05 → index 1, remainder 0.024 <= 0.025: no adjustment.
        let snapped = incremental_snap(0.074, 0.05, 1.0);
        assert!((snapped - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_incremental_snap_over_half_moves_with_travel() {
        let snapped = incremental_snap(0.076, 0.05, 1.0);
        assert!((snapped - 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_incremental_snap_over_half_against_travel() {
        // The adjustment follows the travel direction, not the remainder.
        let snapped = incremental_snap(0.076, 0.05, -1.0);
        assert!((snapped - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_incremental_snap_zero_step_guard() {
        assert_eq!(incremental_snap(0.3, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_incremental_snap_result_is_multiple() {
        for position in [0.0, 0.013, 0.26, 1.99, -0.37] {
            let snapped = incremental_snap(position, 0.05, 1.0);
            let quotient = snapped / 0.05;
            assert!((quotient - quotient.round()).abs() < 1e-9, "{}", snapped);
        }
    }

    #[test]
    fn test_incremental_snap_within_one_step_of_position() {
        // With travel in the remainder's direction the result stays within
        // one step of the input.
        for position in [0.01, 0.26, 1.99, 3.141] {
            let snapped = incremental_snap(position, 0.05, 1.0);
            assert!((snapped - position).abs() <= 0.05 + 1e-12);
        }
    }

    #[test]
    fn test_incremental_snap_negative_position() {
        // floor(-0.074 / 0.05) = -2, remainder 0.026 > 0.025: move with
        // positive travel to index -1.
        let snapped = incremental_snap(-0.074, 0.05, 1.0);
        assert!((snapped - -0.05).abs() < 1e-12);
    }

    // ── rotation_snap ──

    #[test]
    fn test_rotation_snap_rounds_to_nearest_increment() {
        let inc = 15f64.to_radians();
        let snapped = rotation_snap(22f64.to_radians(), inc);
        assert!((snapped - inc).abs() < 1e-12);

        let snapped = rotation_snap(23f64.to_radians(), inc);
        assert!((snapped - 30f64.to_radians()).abs() < 1e-12);
    }

    #[test]
    fn test_rotation_snap_zero_increment_guard() {
        assert_eq!(rotation_snap(1.0, 0.0), 0.0);
    }

    #[test]
    fn test_rotation_snap_negative_angle() {
        let inc = 15f64.to_radians();
        let snapped = rotation_snap(-22f64.to_radians(), inc);
        assert!((snapped - -15f64.to_radians()).abs() < 1e-12);
    }
}
