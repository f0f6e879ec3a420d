//! The collision-checking capability the rules consume.
//!
//! The geometric engine itself lives outside this crate; rules only depend
//! on the narrow contract below. Implementations classify each overlap
//! against relationship rules so the chain can distinguish an expected
//! contact from an illegal one or from a replace relationship.

use glam::DVec3;

use crate::scene::{Aabb, Command, EntityId, SceneGraph};

/// How an overlap relates to the pending command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionClass {
    /// Contact the relationship rules allow (e.g. resting on a shelf).
    Expected,
    /// Contact that makes the placement invalid.
    Illegal,
    /// The pending entity replaces the matched one.
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionHit {
    pub entity: EntityId,
    pub class: CollisionClass,
}

/// Result of a collision query.
#[derive(Debug, Clone, Default)]
pub struct CollisionReport {
    pub hits: Vec<CollisionHit>,
}

impl CollisionReport {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn has_illegal(&self) -> bool {
        self.hits.iter().any(|h| h.class == CollisionClass::Illegal)
    }

    pub fn of_class(&self, class: CollisionClass) -> impl Iterator<Item = EntityId> + '_ {
        self.hits
            .iter()
            .filter(move |h| h.class == class)
            .map(|h| h.entity)
    }
}

/// Collision queries against the in-memory scene, including the prospective
/// state represented by a temporary surrogate.
///
/// The surrogate is a serially-accessed shared resource: exactly one
/// insertion may be outstanding per in-flight evaluation, and the caller
/// must guarantee removal on every exit path (see [`SurrogateGuard`]).
pub trait CollisionChecker {
    /// Overlaps produced by the pending command's end state.
    fn check(&mut self, graph: &SceneGraph, command: &Command) -> CollisionReport;

    /// Wider-margin variant of [`check`](Self::check); defaults to the
    /// plain check for engines without an extended pass.
    fn extended_check(&mut self, graph: &SceneGraph, command: &Command) -> CollisionReport {
        self.check(graph, command)
    }

    /// Current overlaps of an entity already in the graph.
    fn entity_collisions(&self, graph: &SceneGraph, entity: EntityId) -> CollisionReport;

    /// Whether an entity is legal with zero collisions (some classes of
    /// entity must rest against something).
    fn legal_zero_collision(&self, graph: &SceneGraph, entity: EntityId) -> bool;

    /// Candidate parents a pending command could validly attach to. More
    /// than one candidate is an ambiguous pick the parent-resolution rules
    /// correct.
    fn parent_candidates(&self, graph: &SceneGraph, command: &Command) -> Vec<EntityId>;

    /// The single best parent for the command, if one exists.
    fn find_appropriate_parent(
        &self,
        graph: &SceneGraph,
        command: &Command,
    ) -> Option<EntityId> {
        self.parent_candidates(graph, command).first().copied()
    }

    /// Entities found in `search` extent along `direction` from the entity.
    fn neighbors(
        &self,
        graph: &SceneGraph,
        entity: EntityId,
        direction: DVec3,
        search: Aabb,
    ) -> Vec<EntityId>;

    /// Insert a temporary surrogate of the pending command so subsequent
    /// queries see the prospective post-command state.
    fn add_surrogate(&mut self, graph: &SceneGraph, command: &Command);

    /// Remove the outstanding surrogate.
    fn remove_surrogate(&mut self);
}

/// Scoped surrogate insertion: the surrogate is retracted when the guard
/// drops, on every exit path of the cascade that engaged it.
pub struct SurrogateGuard<'a> {
    checker: &'a mut dyn CollisionChecker,
}

impl<'a> SurrogateGuard<'a> {
    pub fn engage(
        checker: &'a mut dyn CollisionChecker,
        graph: &SceneGraph,
        command: &Command,
    ) -> Self {
        checker.add_surrogate(graph, command);
        Self { checker }
    }

    pub fn checker(&mut self) -> &mut dyn CollisionChecker {
        self.checker
    }
}

impl Drop for SurrogateGuard<'_> {
    fn drop(&mut self) {
        self.checker.remove_surrogate();
    }
}

/// A checker that reports no collisions. Used by the replay CLI and as a
/// convenient base for tests that only exercise non-collision rules.
#[derive(Debug, Default)]
pub struct NullChecker {
    surrogates_outstanding: usize,
}

impl NullChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of surrogates currently inserted; zero after any well-behaved
    /// evaluation.
    pub fn surrogates_outstanding(&self) -> usize {
        self.surrogates_outstanding
    }
}

impl CollisionChecker for NullChecker {
    fn check(&mut self, _graph: &SceneGraph, _command: &Command) -> CollisionReport {
        CollisionReport::default()
    }

    fn entity_collisions(&self, _graph: &SceneGraph, _entity: EntityId) -> CollisionReport {
        CollisionReport::default()
    }

    fn legal_zero_collision(&self, _graph: &SceneGraph, _entity: EntityId) -> bool {
        true
    }

    fn parent_candidates(&self, _graph: &SceneGraph, _command: &Command) -> Vec<EntityId> {
        Vec::new()
    }

    fn neighbors(
        &self,
        _graph: &SceneGraph,
        _entity: EntityId,
        _direction: DVec3,
        _search: Aabb,
    ) -> Vec<EntityId> {
        Vec::new()
    }

    fn add_surrogate(&mut self, _graph: &SceneGraph, _command: &Command) {
        self.surrogates_outstanding += 1;
    }

    fn remove_surrogate(&mut self) {
        self.surrogates_outstanding = self.surrogates_outstanding.saturating_sub(1);
    }
}
