//! The in-memory scene graph: an id-indexed entity tree.
//!
//! Parent/child links are kept mutually consistent through the operations
//! here; rules never edit the link fields directly.

use std::collections::HashMap;

use crate::error::EngineError;

use super::entity::{Entity, EntityId};

#[derive(Debug, Default)]
pub struct SceneGraph {
    entities: HashMap<EntityId, Entity>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Like [`get`](Self::get), but a missing id is a programming error.
    pub fn require(&self, id: EntityId) -> Result<&Entity, EngineError> {
        self.entities
            .get(&id)
            .ok_or(EngineError::UnknownEntity { id })
    }

    pub fn require_mut(&mut self, id: EntityId) -> Result<&mut Entity, EngineError> {
        self.entities
            .get_mut(&id)
            .ok_or(EngineError::UnknownEntity { id })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Insert an entity, wiring it under its declared parent.
    ///
    /// A kit-id must reference an entity already present (the kit
    /// controller); insert controllers before their members.
    pub fn insert(&mut self, entity: Entity) -> Result<(), EngineError> {
        if self.entities.contains_key(&entity.id) {
            return Err(EngineError::DuplicateEntity { id: entity.id });
        }
        if let Some(kit) = entity.kit {
            if !self.entities.contains_key(&kit) {
                return Err(EngineError::inconsistent(format!(
                    "entity {} references missing kit controller {}",
                    entity.id, kit
                )));
            }
        }
        if let Some(parent) = entity.parent {
            let parent_entity = self
                .entities
                .get_mut(&parent)
                .ok_or(EngineError::UnknownParent { id: parent })?;
            parent_entity.children.push(entity.id);
        }
        self.entities.insert(entity.id, entity);
        Ok(())
    }

    /// Remove an entity and its entire subtree. Returns the removed root.
    pub fn remove(&mut self, id: EntityId) -> Result<Entity, EngineError> {
        let entity = self
            .entities
            .remove(&id)
            .ok_or(EngineError::UnknownEntity { id })?;
        if let Some(parent) = entity.parent {
            if let Some(parent_entity) = self.entities.get_mut(&parent) {
                parent_entity.children.retain(|c| *c != id);
            }
        }
        for child in &entity.children {
            // Children were linked on insert; a missing one means the
            // graph was edited outside this module.
            let _ = self.remove(*child);
        }
        Ok(entity)
    }

    /// Move an entity under a new parent, keeping both link sides consistent.
    pub fn reparent(&mut self, id: EntityId, new_parent: EntityId) -> Result<(), EngineError> {
        if !self.entities.contains_key(&new_parent) {
            return Err(EngineError::UnknownParent { id: new_parent });
        }
        let old_parent = self.require(id)?.parent;
        if let Some(old) = old_parent {
            if let Some(old_entity) = self.entities.get_mut(&old) {
                old_entity.children.retain(|c| *c != id);
            }
        }
        self.entities
            .get_mut(&new_parent)
            .expect("checked above")
            .children
            .push(id);
        self.entities.get_mut(&id).expect("checked above").parent = Some(new_parent);
        Ok(())
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut current = self.get(id).and_then(|e| e.parent);
        while let Some(ancestor) = current {
            out.push(ancestor);
            current = self.get(ancestor).and_then(|e| e.parent);
        }
        out
    }

    /// Nearest ancestor shared by every candidate, if any.
    ///
    /// A candidate that is itself an ancestor of all the others counts as
    /// the shared ancestor.
    pub fn nearest_common_ancestor(&self, candidates: &[EntityId]) -> Option<EntityId> {
        let first = *candidates.first()?;
        // Chain of the first candidate including itself, nearest first.
        let mut chain = vec![first];
        chain.extend(self.ancestors(first));

        for candidate in &candidates[1..] {
            let mut other = vec![*candidate];
            other.extend(self.ancestors(*candidate));
            chain.retain(|id| other.contains(id));
            if chain.is_empty() {
                return None;
            }
        }
        chain.first().copied()
    }

    /// Entities belonging to the kit controlled by `controller`.
    pub fn kit_members(&self, controller: EntityId) -> Vec<EntityId> {
        let mut members: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.kit == Some(controller))
            .map(|e| e.id)
            .collect();
        members.sort();
        members
    }

    /// Entities belonging to the template controlled by `controller`.
    pub fn template_members(&self, controller: EntityId) -> Vec<EntityId> {
        let mut members: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.template == Some(controller))
            .map(|e| e.id)
            .collect();
        members.sort();
        members
    }
}
