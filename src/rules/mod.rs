//! The rule chain: contract, registry, chain tables, and executor.
//!
//! Every rule is a plain function tagged with a [`RuleKind`]; chains and
//! gate→detail groups are data tables keyed by [`RuleId`], so ordering and
//! rollback policy live here rather than in the rules themselves. The
//! executor walks a command's chain in fixed order and short-circuits when
//! an inviolable rule rejects.

pub mod cascade;
pub mod parenting;
pub mod placement;
pub mod replace;
pub mod result;
pub mod scaling;
pub mod snap;

pub use cascade::Strategy;
pub use result::{Evaluation, Rollback, Severity};
pub use snap::{closest_value, incremental_snap, rotation_snap};

use crate::collision::CollisionChecker;
use crate::error::EngineError;
use crate::hooks::{EntityBuilder, Presentation};
use crate::profile::Profile;
use crate::scene::{Command, CommandKind, SceneGraph};

/// Everything a rule may touch during evaluation.
///
/// Scratch state stays on the stack inside each rule; the context only
/// carries the shared collaborators.
pub struct RuleCtx<'a> {
    pub graph: &'a mut SceneGraph,
    pub checker: &'a mut dyn CollisionChecker,
    pub builder: &'a dyn EntityBuilder,
    pub presenter: &'a dyn Presentation,
    pub profile: &'a Profile,
}

/// Standard rules shape behavior and hints; inviolable rules encode hard
/// constraints and are the only ones allowed to reject the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Standard,
    Inviolable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleId {
    UsesSnaps,
    AbsoluteMoveSnap,
    IncrementalMoveSnap,
    RotationSnap,
    ScaleSizeSnap,
    ScaleRestriction,
    SharedAncestor,
    AllowedParent,
    PermanentParent,
    LatchPermanentParent,
    ZoneBounds,
    CollisionLegality,
    Replacement,
    AutoAddCascade,
    AutoRemoveGuard,
    KitControllerGuard,
    KitRemoval,
    TemplateRemoval,
    EditableHint,
}

pub type RuleFn = fn(&mut RuleCtx<'_>, &mut Command, &mut Evaluation) -> Result<(), EngineError>;

pub struct RuleDef {
    pub id: RuleId,
    pub kind: RuleKind,
    pub run: RuleFn,
}

const REGISTRY: &[RuleDef] = &[
    RuleDef {
        id: RuleId::UsesSnaps,
        kind: RuleKind::Standard,
        run: snap::uses_snaps,
    },
    RuleDef {
        id: RuleId::AbsoluteMoveSnap,
        kind: RuleKind::Standard,
        run: snap::absolute_move_snap,
    },
    RuleDef {
        id: RuleId::IncrementalMoveSnap,
        kind: RuleKind::Standard,
        run: snap::incremental_move_snap,
    },
    RuleDef {
        id: RuleId::RotationSnap,
        kind: RuleKind::Standard,
        run: snap::rotation_snap_rule,
    },
    RuleDef {
        id: RuleId::ScaleSizeSnap,
        kind: RuleKind::Standard,
        run: scaling::scale_size_snap,
    },
    RuleDef {
        id: RuleId::ScaleRestriction,
        kind: RuleKind::Standard,
        run: scaling::scale_restriction,
    },
    RuleDef {
        id: RuleId::SharedAncestor,
        kind: RuleKind::Standard,
        run: parenting::shared_ancestor,
    },
    RuleDef {
        id: RuleId::AllowedParent,
        kind: RuleKind::Inviolable,
        run: parenting::allowed_parent,
    },
    RuleDef {
        id: RuleId::PermanentParent,
        kind: RuleKind::Inviolable,
        run: parenting::permanent_parent,
    },
    RuleDef {
        id: RuleId::LatchPermanentParent,
        kind: RuleKind::Standard,
        run: parenting::latch_permanent_parent,
    },
    RuleDef {
        id: RuleId::ZoneBounds,
        kind: RuleKind::Inviolable,
        run: placement::zone_bounds,
    },
    RuleDef {
        id: RuleId::CollisionLegality,
        kind: RuleKind::Inviolable,
        run: placement::collision_legality,
    },
    RuleDef {
        id: RuleId::Replacement,
        kind: RuleKind::Inviolable,
        run: replace::replacement,
    },
    RuleDef {
        id: RuleId::AutoAddCascade,
        kind: RuleKind::Inviolable,
        run: cascade::auto_add_cascade,
    },
    RuleDef {
        id: RuleId::AutoRemoveGuard,
        kind: RuleKind::Inviolable,
        run: cascade::auto_remove_guard,
    },
    RuleDef {
        id: RuleId::KitControllerGuard,
        kind: RuleKind::Inviolable,
        run: cascade::kit_controller_guard,
    },
    RuleDef {
        id: RuleId::KitRemoval,
        kind: RuleKind::Inviolable,
        run: cascade::kit_removal,
    },
    RuleDef {
        id: RuleId::TemplateRemoval,
        kind: RuleKind::Standard,
        run: cascade::template_removal,
    },
    RuleDef {
        id: RuleId::EditableHint,
        kind: RuleKind::Standard,
        run: placement::editable_hint,
    },
];

pub fn lookup(id: RuleId) -> &'static RuleDef {
    REGISTRY
        .iter()
        .find(|def| def.id == id)
        .expect("every rule id is registered")
}

/// Gate → detail group: the gate runs first, and only if its condition
/// holds do the branches run in priority order, first match winning. The
/// group's externally visible verdict is always `result = true`; a nested
/// inviolable rejection is relayed unchanged.
#[derive(Debug, Clone, Copy)]
pub struct RuleGroup {
    pub name: &'static str,
    pub gate: RuleId,
    pub branches: &'static [RuleId],
}

#[derive(Debug, Clone, Copy)]
pub enum Step {
    Rule(RuleId),
    Group(RuleGroup),
}

const MOVE_SNAP_GROUP: RuleGroup = RuleGroup {
    name: "move-snaps",
    gate: RuleId::UsesSnaps,
    branches: &[RuleId::AbsoluteMoveSnap, RuleId::IncrementalMoveSnap],
};

const SCALE_SNAP_GROUP: RuleGroup = RuleGroup {
    name: "scale-snaps",
    gate: RuleId::UsesSnaps,
    branches: &[RuleId::ScaleSizeSnap],
};

const ADD_CHAIN: &[Step] = &[
    Step::Rule(RuleId::ZoneBounds),
    Step::Rule(RuleId::CollisionLegality),
    Step::Rule(RuleId::Replacement),
    Step::Rule(RuleId::AutoAddCascade),
];

const ADD_CHILD_CHAIN: &[Step] = &[
    Step::Rule(RuleId::SharedAncestor),
    Step::Rule(RuleId::AllowedParent),
    Step::Rule(RuleId::PermanentParent),
    Step::Rule(RuleId::ZoneBounds),
    Step::Rule(RuleId::CollisionLegality),
    Step::Rule(RuleId::Replacement),
    Step::Rule(RuleId::AutoAddCascade),
    Step::Rule(RuleId::LatchPermanentParent),
];

const MOVE_CHAIN: &[Step] = &[
    Step::Group(MOVE_SNAP_GROUP),
    Step::Rule(RuleId::ZoneBounds),
    Step::Rule(RuleId::CollisionLegality),
    Step::Rule(RuleId::Replacement),
    Step::Rule(RuleId::AutoAddCascade),
];

const SCALE_CHAIN: &[Step] = &[
    Step::Group(SCALE_SNAP_GROUP),
    Step::Rule(RuleId::ScaleRestriction),
    Step::Rule(RuleId::CollisionLegality),
];

const ROTATE_CHAIN: &[Step] = &[
    Step::Rule(RuleId::RotationSnap),
    Step::Rule(RuleId::CollisionLegality),
];

const TRANSITION_CHAIN: &[Step] = &[
    Step::Rule(RuleId::SharedAncestor),
    Step::Rule(RuleId::AllowedParent),
    Step::Rule(RuleId::PermanentParent),
    Step::Rule(RuleId::ZoneBounds),
    Step::Rule(RuleId::CollisionLegality),
    Step::Rule(RuleId::LatchPermanentParent),
];

const REMOVE_CHAIN: &[Step] = &[
    Step::Rule(RuleId::KitControllerGuard),
    Step::Rule(RuleId::AutoRemoveGuard),
    Step::Rule(RuleId::KitRemoval),
    Step::Rule(RuleId::TemplateRemoval),
];

const SELECT_CHAIN: &[Step] = &[Step::Rule(RuleId::EditableHint)];

/// The chain a command runs through. Bypass commands resolve to an empty
/// chain, which is what cuts reentrant cascades off.
pub fn chain_for(cmd: &Command) -> &'static [Step] {
    if cmd.bypasses_rules() {
        return &[];
    }
    match cmd.kind() {
        CommandKind::Add => ADD_CHAIN,
        CommandKind::AddChild => ADD_CHILD_CHAIN,
        CommandKind::Move => MOVE_CHAIN,
        CommandKind::Scale => SCALE_CHAIN,
        CommandKind::Rotate => ROTATE_CHAIN,
        CommandKind::TransitionChild => TRANSITION_CHAIN,
        CommandKind::Remove | CommandKind::RemoveChild => REMOVE_CHAIN,
        CommandKind::Select => SELECT_CHAIN,
    }
}

fn run_rule(
    id: RuleId,
    ctx: &mut RuleCtx<'_>,
    cmd: &mut Command,
    eval: &mut Evaluation,
) -> Result<(), EngineError> {
    (lookup(id).run)(ctx, cmd, eval)?;
    tracing::trace!(
        rule = ?id,
        result = eval.result,
        approved = eval.approved(),
        "rule evaluated"
    );
    Ok(())
}

/// Execute the command's chain and return the accumulated verdict.
pub fn run_chain(ctx: &mut RuleCtx<'_>, cmd: &mut Command) -> Result<Evaluation, EngineError> {
    let mut eval = Evaluation::new();
    let steps = chain_for(cmd);
    tracing::debug!(kind = %cmd.kind(), entity = %cmd.entity(), steps = steps.len(), "chain start");

    for step in steps {
        match step {
            Step::Rule(id) => {
                run_rule(*id, ctx, cmd, &mut eval)?;
                if !eval.approved() && lookup(*id).kind == RuleKind::Inviolable {
                    tracing::debug!(rule = ?id, "chain short-circuit");
                    break;
                }
            }
            Step::Group(group) => {
                run_rule(group.gate, ctx, cmd, &mut eval)?;
                if eval.result {
                    for branch in group.branches {
                        run_rule(*branch, ctx, cmd, &mut eval)?;
                        if !eval.approved() && lookup(*branch).kind == RuleKind::Inviolable {
                            break;
                        }
                        if eval.result {
                            break;
                        }
                    }
                }
                // Groups pick and apply a behavior; they never block.
                eval.result = true;
                if !eval.approved() {
                    tracing::debug!(group = group.name, "chain short-circuit");
                    break;
                }
            }
        }
    }
    tracing::debug!(
        approved = eval.approved(),
        rollback = ?eval.rollback(),
        issued = eval.issued().len(),
        "chain complete"
    );
    Ok(eval)
}

/// Rollback granularity for a rejection of this command: add-path failures
/// reset to the transaction start, everything else clears all commands.
pub(crate) fn rollback_for(cmd: &Command) -> Rollback {
    match cmd.kind() {
        CommandKind::Add | CommandKind::AddChild => Rollback::ResetToStartAllCommands,
        _ => Rollback::ClearAllCommands,
    }
}
