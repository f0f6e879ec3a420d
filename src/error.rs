//! Error types for the validation engine
//!
//! Domain outcomes (rejections, warnings, rollback actions) travel inside
//! the returned `Evaluation`; the errors here are reserved for conditions a
//! caller cannot recover from within the designed control flow, such as a
//! command referencing an entity that does not exist.

use thiserror::Error;

use crate::profile::ProfileError;
use crate::scene::EntityId;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A command or link referenced an entity missing from the graph
    #[error("unknown entity {id}")]
    UnknownEntity { id: EntityId },

    /// A command or entity referenced a parent missing from the graph
    #[error("unknown parent {id}")]
    UnknownParent { id: EntityId },

    /// An entity with this id is already present
    #[error("duplicate entity {id}")]
    DuplicateEntity { id: EntityId },

    /// Parent/child links disagree; the graph was edited outside its API
    #[error("inconsistent scene links: {detail}")]
    InconsistentLinks { detail: String },

    /// Tuning profile failed to load
    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),
}

impl EngineError {
    pub fn inconsistent(detail: impl Into<String>) -> Self {
        Self::InconsistentLinks {
            detail: detail.into(),
        }
    }
}
