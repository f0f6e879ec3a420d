//! Frame conversions between scene, zone, and parent-local coordinates.
//!
//! Pure functions over the scene graph; no state. World transforms are
//! accumulated by walking the ancestor chain, so positions stored
//! parent-local compose into scene space through every intermediate frame.

use glam::{DMat4, DVec3};

use super::entity::{Aabb, Entity, EntityId};
use super::graph::SceneGraph;

/// The entity's own transform relative to its parent frame.
pub fn local_matrix(entity: &Entity) -> DMat4 {
    DMat4::from_scale_rotation_translation(entity.scale, entity.rotation, entity.position)
}

/// Scene-space transform of an entity's frame.
pub fn world_matrix(graph: &SceneGraph, id: EntityId) -> DMat4 {
    let mut chain = Vec::new();
    let mut current = Some(id);
    while let Some(node) = current {
        match graph.get(node) {
            Some(entity) => {
                chain.push(entity);
                current = entity.parent;
            }
            None => break,
        }
    }
    // Root first, so matrices compose outward-in.
    chain
        .iter()
        .rev()
        .fold(DMat4::IDENTITY, |acc, e| acc * local_matrix(e))
}

/// Scene-space position of an entity's origin.
pub fn scene_position(graph: &SceneGraph, id: EntityId) -> DVec3 {
    world_matrix(graph, id).transform_point3(DVec3::ZERO)
}

/// Convert a scene-space point into `frame`'s local coordinates.
pub fn to_local_frame(graph: &SceneGraph, frame: EntityId, scene_point: DVec3) -> DVec3 {
    world_matrix(graph, frame)
        .inverse()
        .transform_point3(scene_point)
}

/// Convert a point in `frame`'s local coordinates into scene space.
pub fn to_scene_frame(graph: &SceneGraph, frame: EntityId, local_point: DVec3) -> DVec3 {
    world_matrix(graph, frame).transform_point3(local_point)
}

/// Nearest ancestor flagged as a zone, including the entity itself.
pub fn zone_of(graph: &SceneGraph, id: EntityId) -> Option<EntityId> {
    let mut current = Some(id);
    while let Some(node) = current {
        let entity = graph.get(node)?;
        if entity.zone {
            return Some(node);
        }
        current = entity.parent;
    }
    None
}

/// Convert a scene-space point into the entity's zone frame, falling back
/// to the scene frame when no zone ancestor exists.
pub fn to_zone_frame(graph: &SceneGraph, id: EntityId, scene_point: DVec3) -> DVec3 {
    match zone_of(graph, id) {
        Some(zone) => to_local_frame(graph, zone, scene_point),
        None => scene_point,
    }
}

/// Loose scene-space box of an entity placed at `scene_position`: the scaled
/// local bounds translated, ignoring rotation. Adequate for containment
/// checks the way loose AABBs are adequate for layout.
pub fn world_box_at(entity: &Entity, scene_position: DVec3) -> Aabb {
    entity.bounds.scaled(entity.scale).translated(scene_position)
}
