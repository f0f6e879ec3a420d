//! Scene model: entities, the graph that links them, the command set that
//! mutates them, and the frame conversions between their coordinate spaces.

pub mod command;
pub mod entity;
pub mod graph;
pub mod transform;

pub use command::{Command, CommandKind, ScaleRestriction};
pub use entity::{keys, Aabb, Entity, EntityId, PropKey, PropValue};
pub use graph::SceneGraph;
