//! Scene Warden - mutation-command validation for a 3D scene graph
//!
//! This library validates and transforms mutation commands (add, move,
//! scale, rotate, delete, select, reparent) issued against a hierarchical
//! scene graph before they are committed. Each command runs through an
//! ordered chain of composable rules that may approve, reject, rewrite
//! command parameters in place, or issue cascading side-effect commands.
//!
//! # Example
//!
//! ```rust
//! use glam::DVec3;
//! use scene_warden::collision::NullChecker;
//! use scene_warden::scene::{keys, Command, Entity, EntityId, PropValue, SceneGraph};
//! use scene_warden::Engine;
//!
//! let mut graph = SceneGraph::new();
//! let mut shelf = Entity::new(EntityId(1));
//! shelf.set_prop(keys::USES_SNAPS, PropValue::Bool(true));
//! shelf.set_prop(keys::SNAP_INCREMENT, PropValue::Float(0.05));
//! graph.insert(shelf).unwrap();
//!
//! let mut cmd = Command::Move {
//!     entity: EntityId(1),
//!     start: DVec3::ZERO,
//!     end: DVec3::new(0.074, 0.0, 0.0),
//!     transient: false,
//! };
//! let engine = Engine::new();
//! let verdict = engine
//!     .validate(&mut graph, &mut NullChecker::new(), &mut cmd)
//!     .unwrap();
//! assert!(verdict.approved());
//! assert_eq!(cmd.end_position().unwrap().x, 0.05);
//! ```

pub mod collision;
pub mod error;
pub mod hooks;
pub mod profile;
pub mod rules;
pub mod scene;

pub use error::EngineError;
pub use profile::{Profile, ProfileError};
pub use rules::{Evaluation, Rollback, RuleCtx, Severity};
pub use scene::{Command, CommandKind, Entity, EntityId, SceneGraph};

use collision::CollisionChecker;
use hooks::{EntityBuilder, NullBuilder, Presentation, SilentPresentation};

/// Configuration for a validation engine
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Tuning profile for engine-level fallbacks
    pub profile: Profile,
}

impl EngineConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tuning profile
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }
}

/// The validation engine: assembles the rule chain for each command and
/// runs it against the scene.
///
/// Evaluation is synchronous and single-threaded; the engine holds no
/// per-command state of its own.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Validate a command with no catalog and no presentation surface.
    ///
    /// Suitable for headless callers: confirmations auto-accept and
    /// messages are dropped. Auto-add hosts need a real builder; use
    /// [`validate_with`](Self::validate_with) for those.
    pub fn validate(
        &self,
        graph: &mut SceneGraph,
        checker: &mut dyn CollisionChecker,
        command: &mut Command,
    ) -> Result<Evaluation, EngineError> {
        self.validate_with(graph, checker, &NullBuilder, &SilentPresentation, command)
    }

    /// Validate a command with the full set of collaborators.
    ///
    /// The command may be rewritten in place (snapping, reparenting); the
    /// returned [`Evaluation`] carries the verdict, rollback action,
    /// severity, and any side-effect commands the rules issued.
    pub fn validate_with(
        &self,
        graph: &mut SceneGraph,
        checker: &mut dyn CollisionChecker,
        builder: &dyn EntityBuilder,
        presenter: &dyn Presentation,
        command: &mut Command,
    ) -> Result<Evaluation, EngineError> {
        let mut ctx = RuleCtx {
            graph,
            checker,
            builder,
            presenter,
            profile: &self.config.profile,
        };
        rules::run_chain(&mut ctx, command)
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec3;

    use crate::collision::NullChecker;
    use crate::scene::{keys, PropValue};

    use super::*;

    #[test]
    fn test_validate_snaps_committed_move() {
        let mut graph = SceneGraph::new();
        let mut e = Entity::new(EntityId(1));
        e.set_prop(keys::USES_SNAPS, PropValue::Bool(true));
        e.set_prop(keys::SNAP_INCREMENT, PropValue::Float(0.05));
        graph.insert(e).unwrap();

        let mut cmd = Command::Move {
            entity: EntityId(1),
            start: DVec3::ZERO,
            end: DVec3::new(0.074, 0.0, 0.0),
            transient: false,
        };
        let verdict = Engine::new()
            .validate(&mut graph, &mut NullChecker::new(), &mut cmd)
            .unwrap();
        assert!(verdict.approved());
        assert!((cmd.end_position().unwrap().x - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_validate_unknown_entity_is_engine_error() {
        let mut graph = SceneGraph::new();
        let mut cmd = Command::Select {
            entity: EntityId(9),
        };
        let err = Engine::new()
            .validate(&mut graph, &mut NullChecker::new(), &mut cmd)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownEntity { .. }));
    }

    #[test]
    fn test_config_builder() {
        let profile = Profile {
            rotation_increment_deg: 45.0,
            ..Profile::default()
        };
        let config = EngineConfig::new().with_profile(profile);
        assert_eq!(config.profile.rotation_increment_deg, 45.0);
    }
}
