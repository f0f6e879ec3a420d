//! Auto-add / auto-remove cascade orchestration.
//!
//! Adding or moving an entity that auto-adds children runs four placement
//! strategies in fixed order against the prospective post-command state (a
//! temporary surrogate inserted into the collision checker). The cascade is
//! all-or-nothing: any strategy failure detaches every child added so far,
//! retracts the surrogate, and rejects the triggering command. Deletion
//! runs the mirror check, and kit/template membership cascades removals of
//! its own.

use glam::DVec3;

use crate::collision::{CollisionChecker, CollisionClass, SurrogateGuard};
use crate::error::EngineError;
use crate::hooks::{EntityBuilder, MessageKey};
use crate::scene::{keys, Command, Entity, EntityId, SceneGraph};

use super::placement::end_scene_position;
use super::result::{Evaluation, Rollback, Severity};
use super::RuleCtx;

/// The four auto-add placement strategies, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Fill a linear run with repeated sub-children up to the host's span.
    Span,
    /// Add a child wherever the host collides with a qualifying neighbor.
    Collision,
    /// Add children at fixed relative offsets regardless of collision.
    Position,
    /// Add terminal cap children at the extremities.
    Ends,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Span,
        Strategy::Collision,
        Strategy::Position,
        Strategy::Ends,
    ];

    fn product_key(self) -> crate::scene::PropKey {
        match self {
            Strategy::Span => keys::SPAN_PRODUCT,
            Strategy::Collision => keys::COLLISION_PRODUCT,
            Strategy::Position => keys::POSITION_PRODUCT,
            Strategy::Ends => keys::END_PRODUCT,
        }
    }
}

#[derive(Debug)]
struct StrategyFailure {
    strategy: Strategy,
}

/// Number of span children a host of this configuration requires: the
/// count that keeps adjacent spacing within the increment step.
fn span_required(host: &Entity) -> Result<usize, StrategyFailure> {
    let increment = host
        .float_prop(keys::SPAN_INCREMENT)
        .ok_or(StrategyFailure {
            strategy: Strategy::Span,
        })?;
    if increment <= 0.0 {
        return Err(StrategyFailure {
            strategy: Strategy::Span,
        });
    }
    let span = host.scaled_size().x;
    let segments = (span / increment).ceil().max(1.0);
    Ok(segments as usize - 1)
}

/// Expected-collision hits that qualify for the collision strategy: the
/// neighbor's classification must overlap the host's qualifier list. A
/// missing qualifier list qualifies every expected hit.
fn qualifying_hits(
    graph: &SceneGraph,
    host: &Entity,
    report: &crate::collision::CollisionReport,
) -> Vec<EntityId> {
    let qualifier = host.texts_prop(keys::COLLISION_QUALIFIER);
    report
        .of_class(CollisionClass::Expected)
        .filter(|id| match qualifier {
            None => true,
            Some(wanted) => graph
                .get(*id)
                .and_then(|e| e.texts_prop(keys::CLASSIFICATION))
                .map(|classes| {
                    wanted
                        .iter()
                        .any(|w| classes.iter().any(|c| w.eq_ignore_ascii_case(c)))
                })
                .unwrap_or(false),
        })
        .collect()
}

fn build_child(
    builder: &dyn EntityBuilder,
    host: &Entity,
    strategy: Strategy,
    product: &str,
    local: DVec3,
) -> Result<Entity, StrategyFailure> {
    let mut child = builder.build(product).ok_or(StrategyFailure { strategy })?;
    child.parent = Some(host.id);
    child.position = local;
    child.set_prop(keys::AUTO_ADDED, crate::scene::PropValue::Bool(true));
    child.set_prop(
        keys::PRODUCT,
        crate::scene::PropValue::Text(product.to_string()),
    );
    match strategy {
        Strategy::Span => {
            child.set_prop(keys::AUTO_SPAN, crate::scene::PropValue::Bool(true));
        }
        Strategy::Position => {
            child.set_prop(keys::NON_CRITICAL, crate::scene::PropValue::Bool(true));
        }
        _ => {}
    }
    Ok(child)
}

/// Plan one strategy's children for the pending command. A strategy that is
/// not configured plans nothing; a configured strategy that cannot be
/// satisfied fails outright.
fn plan_strategy(
    strategy: Strategy,
    graph: &SceneGraph,
    checker: &mut dyn CollisionChecker,
    builder: &dyn EntityBuilder,
    host: &Entity,
    cmd: &Command,
    end_scene: DVec3,
) -> Result<Vec<Entity>, StrategyFailure> {
    let product = match host.text_prop(strategy.product_key()) {
        Some(p) => p.to_string(),
        None if strategy == Strategy::Position => {
            // Offsets without a product is a configuration failure; neither
            // is simply "not configured".
            if host.floats_prop(keys::POSITION_OFFSETS).is_some() {
                return Err(StrategyFailure { strategy });
            }
            return Ok(Vec::new());
        }
        None => return Ok(Vec::new()),
    };

    let size = host.bounds.size();
    match strategy {
        Strategy::Span => {
            let count = span_required(host)?;
            let mut children = Vec::with_capacity(count);
            for i in 1..=count {
                let x = -size.x / 2.0 + size.x * i as f64 / (count + 1) as f64;
                children.push(build_child(
                    builder,
                    host,
                    strategy,
                    &product,
                    DVec3::new(x, 0.0, 0.0),
                )?);
            }
            Ok(children)
        }
        Strategy::Collision => {
            // Wider-margin query: adjacency counts, not just overlap.
            let report = checker.extended_check(graph, cmd);
            let mut children = Vec::new();
            for neighbor in qualifying_hits(graph, host, &report) {
                let neighbor_scene =
                    crate::scene::transform::scene_position(graph, neighbor);
                // The host is not yet at its end position; express the
                // neighbor relative to the pending frame.
                let local = host.rotation.inverse() * (neighbor_scene - end_scene);
                children.push(build_child(builder, host, strategy, &product, local)?);
            }
            Ok(children)
        }
        Strategy::Position => {
            let offsets = host
                .floats_prop(keys::POSITION_OFFSETS)
                .ok_or(StrategyFailure { strategy })?;
            if offsets.is_empty() || offsets.len() % 3 != 0 {
                return Err(StrategyFailure { strategy });
            }
            let mut children = Vec::with_capacity(offsets.len() / 3);
            for triple in offsets.chunks_exact(3) {
                children.push(build_child(
                    builder,
                    host,
                    strategy,
                    &product,
                    DVec3::new(triple[0], triple[1], triple[2]),
                )?);
            }
            Ok(children)
        }
        Strategy::Ends => {
            let mut children = Vec::with_capacity(2);
            for sign in [-1.0, 1.0] {
                children.push(build_child(
                    builder,
                    host,
                    strategy,
                    &product,
                    DVec3::new(sign * size.x / 2.0, 0.0, 0.0),
                )?);
            }
            Ok(children)
        }
    }
}

/// Auto-add orchestration for add and move commands.
pub(crate) fn auto_add_cascade(
    ctx: &mut RuleCtx<'_>,
    cmd: &mut Command,
    eval: &mut Evaluation,
) -> Result<(), EngineError> {
    let host = ctx.graph.require(cmd.entity())?.clone();
    if host.flag(keys::MITER_CUT) || !host.can_auto_add() {
        eval.result = false;
        return Ok(());
    }
    let move_path = matches!(cmd, Command::Move { .. });

    if cmd.is_transient() {
        if move_path {
            // Drag variant: shed non-critical auto-added children up front;
            // the committed move re-runs the full cascade and re-attaches.
            for child_id in &host.children {
                let child = ctx.graph.require(*child_id)?;
                if child.is_auto_added()
                    && child.flag(keys::NON_CRITICAL)
                    && !eval.removal_scheduled(*child_id)
                {
                    eval.issue(Command::RemoveChild {
                        entity: *child_id,
                        parent: host.id,
                        bypass_rules: true,
                    });
                }
            }
            eval.result = true;
        } else {
            eval.result = false;
        }
        return Ok(());
    }

    let end_scene = end_scene_position(ctx.graph, cmd).unwrap_or_default();
    let rollback = if move_path {
        Rollback::ClearAllCommands
    } else {
        Rollback::ResetToStartAllCommands
    };

    // A committed move recomputes the auto-add set for the new placement:
    // the stale children are scheduled for removal and fresh ones planned.
    if move_path {
        for child_id in &host.children {
            let child = ctx.graph.require(*child_id)?;
            if child.is_auto_added() && !eval.removal_scheduled(*child_id) {
                eval.issue(Command::RemoveChild {
                    entity: *child_id,
                    parent: host.id,
                    bypass_rules: true,
                });
            }
        }
    }

    let RuleCtx {
        graph,
        checker,
        builder,
        presenter,
        ..
    } = ctx;
    let mut attached: Vec<EntityId> = Vec::new();
    let mut guard = SurrogateGuard::engage(&mut **checker, &**graph, cmd);

    for strategy in Strategy::ALL {
        let planned = plan_strategy(
            strategy,
            &**graph,
            guard.checker(),
            *builder,
            &host,
            cmd,
            end_scene,
        );
        match planned {
            Ok(children) => {
                for child in children {
                    let id = child.id;
                    graph.insert(child)?;
                    attached.push(id);
                }
            }
            Err(failure) => {
                // Abort the whole cascade: detach everything attached so
                // far; the guard retracts the surrogate on return.
                tracing::debug!(strategy = ?failure.strategy, host = %host.id, "auto-add cascade aborted");
                for id in attached.drain(..).rev() {
                    let _ = graph.remove(id);
                }
                presenter.popup(MessageKey::AutoAddFailed);
                eval.reject(rollback);
                eval.result = false;
                return Ok(());
            }
        }
    }

    // Invisible children attach only once every strategy has succeeded.
    if let Some(products) = host.texts_prop(keys::INVISIBLE_PRODUCTS) {
        for product in products {
            match builder.build(product) {
                Some(mut child) => {
                    child.parent = Some(host.id);
                    child.set_prop(keys::AUTO_ADDED, crate::scene::PropValue::Bool(true));
                    child.set_prop(keys::INVISIBLE, crate::scene::PropValue::Bool(true));
                    child.set_prop(
                        keys::PRODUCT,
                        crate::scene::PropValue::Text(product.to_string()),
                    );
                    let id = child.id;
                    graph.insert(child)?;
                    attached.push(id);
                }
                None => {
                    tracing::debug!(product = %product, host = %host.id, "invisible auto-add aborted");
                    for id in attached.drain(..).rev() {
                        let _ = graph.remove(id);
                    }
                    presenter.popup(MessageKey::AutoAddFailed);
                    eval.reject(rollback);
                    eval.result = false;
                    return Ok(());
                }
            }
        }
    }

    tracing::debug!(host = %host.id, added = attached.len(), "auto-add cascade complete");
    eval.result = true;
    Ok(())
}

/// Whether removing `removing` still leaves the host's sibling set
/// satisfying the strategy's placement invariant.
fn removal_keeps_invariant(
    strategy: Strategy,
    graph: &SceneGraph,
    checker: &dyn CollisionChecker,
    host: &Entity,
    removing: EntityId,
) -> bool {
    let product = match host.text_prop(strategy.product_key()) {
        Some(p) => p,
        None => return true,
    };
    let required = match strategy {
        Strategy::Span => match span_required(host) {
            Ok(n) => n,
            Err(_) => return true,
        },
        Strategy::Collision => {
            let report = checker.entity_collisions(graph, host.id);
            qualifying_hits(graph, host, &report).len()
        }
        Strategy::Position => host
            .floats_prop(keys::POSITION_OFFSETS)
            .map(|o| o.len() / 3)
            .unwrap_or(0),
        Strategy::Ends => 2,
    };

    let remaining = host
        .children
        .iter()
        .filter(|id| **id != removing)
        .filter_map(|id| graph.get(*id))
        .filter(|c| c.is_auto_added() && c.text_prop(keys::PRODUCT) == Some(product))
        .count();
    remaining >= required
}

/// Mirror check before removing an auto-added entity: every configured
/// strategy must still be satisfied by the remaining siblings.
pub(crate) fn auto_remove_guard(
    ctx: &mut RuleCtx<'_>,
    cmd: &mut Command,
    eval: &mut Evaluation,
) -> Result<(), EngineError> {
    if !cmd.is_removal() {
        eval.result = false;
        return Ok(());
    }
    let entity = ctx.graph.require(cmd.entity())?.clone();
    if !entity.is_auto_added() {
        eval.result = false;
        return Ok(());
    }
    let host = match entity.parent.and_then(|p| ctx.graph.get(p)) {
        Some(h) => h.clone(),
        None => {
            eval.result = false;
            return Ok(());
        }
    };
    if host.flag(keys::IGNORE_AUTO_ADD_DELETE_RESTRICTION) || entity.shadow {
        eval.result = true;
        return Ok(());
    }

    for strategy in Strategy::ALL {
        if !removal_keeps_invariant(strategy, ctx.graph, &*ctx.checker, &host, entity.id) {
            tracing::debug!(strategy = ?strategy, entity = %entity.id, "auto-remove rejected");
            ctx.presenter.popup(MessageKey::DeleteRestricted);
            eval.reject(Rollback::ClearAllCommands);
            eval.result = false;
            return Ok(());
        }
    }
    eval.result = true;
    Ok(())
}

/// A kit controller cannot be removed directly while members remain.
pub(crate) fn kit_controller_guard(
    ctx: &mut RuleCtx<'_>,
    cmd: &mut Command,
    eval: &mut Evaluation,
) -> Result<(), EngineError> {
    if !cmd.is_removal() || ctx.graph.kit_members(cmd.entity()).is_empty() {
        eval.result = true;
        return Ok(());
    }
    ctx.presenter.status(MessageKey::KitControllerLocked);
    eval.escalate(Severity::Severe);
    eval.reject(Rollback::ClearAllCommands);
    eval.result = false;
    Ok(())
}

/// Deleting any kit member cascades to the rest of the kit: after a
/// confirmation, bypass-rules removals are issued for every other member,
/// the invisible controller, and any auto-span entity colliding with a
/// member being removed.
pub(crate) fn kit_removal(
    ctx: &mut RuleCtx<'_>,
    cmd: &mut Command,
    eval: &mut Evaluation,
) -> Result<(), EngineError> {
    if !cmd.is_removal() {
        eval.result = false;
        return Ok(());
    }
    let entity = ctx.graph.require(cmd.entity())?;
    let controller = match entity.kit {
        Some(c) => c,
        None => {
            eval.result = false;
            return Ok(());
        }
    };
    if !ctx.presenter.confirm(MessageKey::KitRemoveConfirm) {
        eval.reject(Rollback::ClearAllCommands);
        eval.result = false;
        return Ok(());
    }

    let members = ctx.graph.kit_members(controller);
    let mut to_remove: Vec<EntityId> = Vec::new();
    for member in &members {
        if *member != cmd.entity() {
            to_remove.push(*member);
        }
        // Auto-span entities colliding with a member being removed go too.
        let report = ctx.checker.entity_collisions(ctx.graph, *member);
        for hit in &report.hits {
            if ctx
                .graph
                .get(hit.entity)
                .map(|e| e.is_auto_span())
                .unwrap_or(false)
            {
                to_remove.push(hit.entity);
            }
        }
    }
    to_remove.push(controller);

    for id in to_remove {
        if id != cmd.entity() && !eval.removal_scheduled(id) {
            eval.issue(Command::Remove {
                entity: id,
                bypass_rules: true,
            });
        }
    }
    eval.result = true;
    Ok(())
}

/// Removing a template's last non-auto-span child removes the template
/// controller itself, without a prompt.
pub(crate) fn template_removal(
    ctx: &mut RuleCtx<'_>,
    cmd: &mut Command,
    eval: &mut Evaluation,
) -> Result<(), EngineError> {
    if !cmd.is_removal() {
        eval.result = false;
        return Ok(());
    }
    let entity = ctx.graph.require(cmd.entity())?;
    let controller = match entity.template {
        Some(c) => c,
        None => {
            eval.result = false;
            return Ok(());
        }
    };
    let remaining = ctx
        .graph
        .template_members(controller)
        .into_iter()
        .filter(|id| *id != cmd.entity())
        .filter(|id| {
            ctx.graph
                .get(*id)
                .map(|e| !e.is_auto_span())
                .unwrap_or(false)
        })
        .count();

    if remaining == 0 && !eval.removal_scheduled(controller) {
        eval.issue(Command::Remove {
            entity: controller,
            bypass_rules: true,
        });
        eval.result = true;
    } else {
        eval.result = false;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use glam::DQuat;

    use crate::collision::NullChecker;
    use crate::hooks::{NullBuilder, SilentPresentation};
    use crate::profile::Profile;
    use crate::scene::{Aabb, PropValue};

    use super::*;

    /// Builder that allocates sequential ids and can be told to fail for
    /// one product.
    struct CountingBuilder {
        next: Cell<u32>,
        fail_product: Option<&'static str>,
    }

    impl CountingBuilder {
        fn new(first_id: u32) -> Self {
            Self {
                next: Cell::new(first_id),
                fail_product: None,
            }
        }

        fn failing_on(first_id: u32, product: &'static str) -> Self {
            Self {
                next: Cell::new(first_id),
                fail_product: Some(product),
            }
        }
    }

    impl EntityBuilder for CountingBuilder {
        fn build(&self, product: &str) -> Option<Entity> {
            if self.fail_product == Some(product) {
                return None;
            }
            let id = self.next.get();
            self.next.set(id + 1);
            Some(Entity::new(EntityId(id)))
        }
    }

    fn span_host(id: u32) -> Entity {
        let mut host = Entity::new(EntityId(id));
        // Span 4.0 with increment 1.0: ceil(4)-1 = 3 children required.
        host.bounds = Aabb::new(DVec3::new(-2.0, 0.0, -0.5), DVec3::new(2.0, 1.0, 0.5));
        host.set_prop(keys::SPAN_PRODUCT, PropValue::Text("baluster".to_string()));
        host.set_prop(keys::SPAN_INCREMENT, PropValue::Float(1.0));
        host
    }

    fn run_cascade(
        graph: &mut SceneGraph,
        checker: &mut dyn CollisionChecker,
        builder: &dyn EntityBuilder,
        cmd: &mut Command,
    ) -> Evaluation {
        let presenter = SilentPresentation;
        let profile = Profile::default();
        let mut ctx = RuleCtx {
            graph,
            checker,
            builder,
            presenter: &presenter,
            profile: &profile,
        };
        let mut eval = Evaluation::new();
        auto_add_cascade(&mut ctx, cmd, &mut eval).unwrap();
        eval
    }

    fn add_cmd(entity: u32) -> Command {
        Command::Add {
            entity: EntityId(entity),
            position: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            transient: false,
            bypass_rules: false,
        }
    }

    #[test]
    fn test_span_strategy_attaches_required_children() {
        let mut graph = SceneGraph::new();
        graph.insert(span_host(1)).unwrap();
        let mut checker = NullChecker::new();
        let builder = CountingBuilder::new(100);
        let mut cmd = add_cmd(1);

        let eval = run_cascade(&mut graph, &mut checker, &builder, &mut cmd);
        assert!(eval.result);
        assert!(eval.approved());
        let children = &graph.get(EntityId(1)).unwrap().children;
        assert_eq!(children.len(), 3);
        for id in children {
            let child = graph.get(*id).unwrap();
            assert!(child.is_auto_added());
            assert!(child.is_auto_span());
        }
        assert_eq!(checker.surrogates_outstanding(), 0);
    }

    #[test]
    fn test_span_children_are_evenly_spaced() {
        let mut graph = SceneGraph::new();
        graph.insert(span_host(1)).unwrap();
        let mut checker = NullChecker::new();
        let builder = CountingBuilder::new(100);
        let mut cmd = add_cmd(1);
        run_cascade(&mut graph, &mut checker, &builder, &mut cmd);

        let xs: Vec<f64> = graph
            .get(EntityId(1))
            .unwrap()
            .children
            .iter()
            .map(|id| graph.get(*id).unwrap().position.x)
            .collect();
        assert_eq!(xs.len(), 3);
        assert!((xs[0] - -1.0).abs() < 1e-12);
        assert!((xs[1] - 0.0).abs() < 1e-12);
        assert!((xs[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_failed_strategy_aborts_whole_cascade() {
        let mut graph = SceneGraph::new();
        let mut host = span_host(1);
        // Ends strategy runs after span and will fail to build.
        host.set_prop(keys::END_PRODUCT, PropValue::Text("cap".to_string()));
        graph.insert(host).unwrap();
        let mut checker = NullChecker::new();
        let builder = CountingBuilder::failing_on(100, "cap");
        let mut cmd = add_cmd(1);

        let eval = run_cascade(&mut graph, &mut checker, &builder, &mut cmd);
        assert!(!eval.approved());
        assert_eq!(eval.rollback(), Rollback::ResetToStartAllCommands);
        // The span children added before the failure are detached again.
        assert!(graph.get(EntityId(1)).unwrap().children.is_empty());
        assert_eq!(graph.len(), 1);
        assert_eq!(checker.surrogates_outstanding(), 0);
    }

    #[test]
    fn test_move_path_failure_clears_all_commands() {
        let mut graph = SceneGraph::new();
        let mut host = span_host(1);
        host.set_prop(keys::END_PRODUCT, PropValue::Text("cap".to_string()));
        graph.insert(host).unwrap();
        let mut checker = NullChecker::new();
        let builder = CountingBuilder::failing_on(100, "cap");
        let mut cmd = Command::Move {
            entity: EntityId(1),
            start: DVec3::ZERO,
            end: DVec3::X,
            transient: false,
        };

        let eval = run_cascade(&mut graph, &mut checker, &builder, &mut cmd);
        assert!(!eval.approved());
        assert_eq!(eval.rollback(), Rollback::ClearAllCommands);
    }

    #[test]
    fn test_transient_move_sheds_non_critical_children() {
        let mut graph = SceneGraph::new();
        graph.insert(span_host(1)).unwrap();
        let mut critical = Entity::new(EntityId(10));
        critical.parent = Some(EntityId(1));
        critical.set_prop(keys::AUTO_ADDED, PropValue::Bool(true));
        graph.insert(critical).unwrap();
        let mut cosmetic = Entity::new(EntityId(11));
        cosmetic.parent = Some(EntityId(1));
        cosmetic.set_prop(keys::AUTO_ADDED, PropValue::Bool(true));
        cosmetic.set_prop(keys::NON_CRITICAL, PropValue::Bool(true));
        graph.insert(cosmetic).unwrap();

        let mut checker = NullChecker::new();
        let builder = NullBuilder;
        let mut cmd = Command::Move {
            entity: EntityId(1),
            start: DVec3::ZERO,
            end: DVec3::X,
            transient: true,
        };
        let eval = run_cascade(&mut graph, &mut checker, &builder, &mut cmd);
        assert!(eval.result);
        assert_eq!(eval.issued().len(), 1);
        assert_eq!(eval.issued()[0].entity(), EntityId(11));
        assert!(eval.issued()[0].bypasses_rules());
        // No surrogate is engaged on the light path.
        assert_eq!(checker.surrogates_outstanding(), 0);
    }

    #[test]
    fn test_miter_cut_host_is_exempt() {
        let mut graph = SceneGraph::new();
        let mut host = span_host(1);
        host.set_prop(keys::MITER_CUT, PropValue::Bool(true));
        graph.insert(host).unwrap();
        let mut checker = NullChecker::new();
        let builder = CountingBuilder::new(100);
        let mut cmd = add_cmd(1);
        let eval = run_cascade(&mut graph, &mut checker, &builder, &mut cmd);
        assert!(!eval.result);
        assert!(eval.approved());
        assert!(graph.get(EntityId(1)).unwrap().children.is_empty());
    }

    #[test]
    fn test_invisible_children_attach_after_success() {
        let mut graph = SceneGraph::new();
        let mut host = span_host(1);
        host.set_prop(
            keys::INVISIBLE_PRODUCTS,
            PropValue::TextList(vec!["bracket".to_string()]),
        );
        graph.insert(host).unwrap();
        let mut checker = NullChecker::new();
        let builder = CountingBuilder::new(100);
        let mut cmd = add_cmd(1);
        let eval = run_cascade(&mut graph, &mut checker, &builder, &mut cmd);
        assert!(eval.result);
        let invisible: Vec<_> = graph
            .get(EntityId(1))
            .unwrap()
            .children
            .iter()
            .filter(|id| graph.get(**id).unwrap().flag(keys::INVISIBLE))
            .collect();
        assert_eq!(invisible.len(), 1);
    }

    fn removal_fixture() -> (SceneGraph, EntityId) {
        // Host with 3 required span children, exactly 3 attached.
        let mut graph = SceneGraph::new();
        graph.insert(span_host(1)).unwrap();
        for id in [10, 11, 12] {
            let mut child = Entity::new(EntityId(id));
            child.parent = Some(EntityId(1));
            child.set_prop(keys::AUTO_ADDED, PropValue::Bool(true));
            child.set_prop(keys::PRODUCT, PropValue::Text("baluster".to_string()));
            child.set_prop(keys::AUTO_SPAN, PropValue::Bool(true));
            graph.insert(child).unwrap();
        }
        (graph, EntityId(10))
    }

    fn run_remove_guard(graph: &mut SceneGraph, entity: EntityId) -> Evaluation {
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
        let mut cmd = Command::Remove {
            entity,
            bypass_rules: false,
        };
        let mut eval = Evaluation::new();
        auto_remove_guard(&mut ctx, &mut cmd, &mut eval).unwrap();
        eval
    }

    #[test]
    fn test_remove_guard_rejects_when_span_run_breaks() {
        let (mut graph, victim) = removal_fixture();
        let eval = run_remove_guard(&mut graph, victim);
        assert!(!eval.approved());
        assert_eq!(eval.rollback(), Rollback::ClearAllCommands);
    }

    #[test]
    fn test_remove_guard_passes_with_surplus() {
        let (mut graph, victim) = removal_fixture();
        // A fourth child makes the run removable.
        let mut extra = Entity::new(EntityId(13));
        extra.parent = Some(EntityId(1));
        extra.set_prop(keys::AUTO_ADDED, PropValue::Bool(true));
        extra.set_prop(keys::PRODUCT, PropValue::Text("baluster".to_string()));
        extra.set_prop(keys::AUTO_SPAN, PropValue::Bool(true));
        graph.insert(extra).unwrap();

        let eval = run_remove_guard(&mut graph, victim);
        assert!(eval.approved());
        assert!(eval.result);
    }

    #[test]
    fn test_remove_guard_honors_ignore_flag() {
        let (mut graph, victim) = removal_fixture();
        graph
            .get_mut(EntityId(1))
            .unwrap()
            .set_prop(keys::IGNORE_AUTO_ADD_DELETE_RESTRICTION, PropValue::Bool(true));
        let eval = run_remove_guard(&mut graph, victim);
        assert!(eval.approved());
    }

    #[test]
    fn test_remove_guard_exempts_shadow() {
        let (mut graph, victim) = removal_fixture();
        graph.get_mut(victim).unwrap().shadow = true;
        let eval = run_remove_guard(&mut graph, victim);
        assert!(eval.approved());
    }

    #[test]
    fn test_remove_guard_ignores_plain_entities() {
        let mut graph = SceneGraph::new();
        graph.insert(Entity::new(EntityId(1))).unwrap();
        let eval = run_remove_guard(&mut graph, EntityId(1));
        assert!(eval.approved());
        assert!(!eval.result);
    }
}
