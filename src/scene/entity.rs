//! Scene entities: tree nodes with a typed property bag and placement state.

use std::collections::HashMap;
use std::fmt;

use glam::{DQuat, DVec3};

/// Unique identifier for an entity in the scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Key into an entity's property bag: (sheet, property) pair.
///
/// Sheets group related properties (snapping, placement, auto-add) the way
/// the source catalog organizes its data sheets. All keys the engine reads
/// are declared in [`keys`]; unknown keys are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropKey {
    pub sheet: &'static str,
    pub name: &'static str,
}

/// A typed property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    FloatList(Vec<f64>),
    TextList(Vec<String>),
}

/// Well-known property keys consumed by the rule chain.
pub mod keys {
    use super::PropKey;

    const fn key(sheet: &'static str, name: &'static str) -> PropKey {
        PropKey { sheet, name }
    }

    // Snapping sheet
    pub const USES_SNAPS: PropKey = key("snapping", "uses_snaps");
    pub const SNAP_VALUES: PropKey = key("snapping", "snap_values");
    pub const SNAP_INCREMENT: PropKey = key("snapping", "snap_increment");
    pub const ROTATION_INCREMENT: PropKey = key("snapping", "rotation_increment");
    pub const SNAP_SIZES: PropKey = key("snapping", "snap_sizes");
    pub const IGNORE_SCALE_OFFSET: PropKey = key("snapping", "ignore_scale_offset");

    // Placement sheet
    pub const USES_PERMANENT_PARENT: PropKey = key("placement", "uses_permanent_parent");
    pub const PERMANENT_PARENT_SET: PropKey = key("placement", "permanent_parent_set");
    pub const PERMANENT_PARENT_ID: PropKey = key("placement", "permanent_parent_id");
    pub const ALLOWED_PARENT_CLASSES: PropKey = key("placement", "allowed_parent_classes");
    pub const CLASSIFICATION: PropKey = key("placement", "classification");
    pub const DEPTH_BUFFER: PropKey = key("placement", "depth_buffer");
    pub const EDITABLE: PropKey = key("placement", "editable");

    // Auto-add sheet
    pub const SPAN_PRODUCT: PropKey = key("autoadd", "span_product");
    pub const SPAN_INCREMENT: PropKey = key("autoadd", "span_increment");
    pub const COLLISION_PRODUCT: PropKey = key("autoadd", "collision_product");
    pub const COLLISION_QUALIFIER: PropKey = key("autoadd", "collision_qualifier");
    pub const POSITION_PRODUCT: PropKey = key("autoadd", "position_product");
    pub const POSITION_OFFSETS: PropKey = key("autoadd", "position_offsets");
    pub const END_PRODUCT: PropKey = key("autoadd", "end_product");
    pub const INVISIBLE_PRODUCTS: PropKey = key("autoadd", "invisible_products");
    pub const AUTO_ADDED: PropKey = key("autoadd", "auto_added");
    pub const AUTO_SPAN: PropKey = key("autoadd", "auto_span");
    pub const NON_CRITICAL: PropKey = key("autoadd", "non_critical");
    pub const INVISIBLE: PropKey = key("autoadd", "invisible");
    pub const PRODUCT: PropKey = key("autoadd", "product");
    pub const MITER_CUT: PropKey = key("autoadd", "miter_cut");
    pub const IGNORE_AUTO_ADD_DELETE_RESTRICTION: PropKey =
        key("autoadd", "ignore_auto_add_delete_restriction");

    /// Every key the engine recognizes, for lookup from external input.
    pub fn all() -> &'static [PropKey] {
        &[
            USES_SNAPS,
            SNAP_VALUES,
            SNAP_INCREMENT,
            ROTATION_INCREMENT,
            SNAP_SIZES,
            IGNORE_SCALE_OFFSET,
            USES_PERMANENT_PARENT,
            PERMANENT_PARENT_SET,
            PERMANENT_PARENT_ID,
            ALLOWED_PARENT_CLASSES,
            CLASSIFICATION,
            DEPTH_BUFFER,
            EDITABLE,
            SPAN_PRODUCT,
            SPAN_INCREMENT,
            COLLISION_PRODUCT,
            COLLISION_QUALIFIER,
            POSITION_PRODUCT,
            POSITION_OFFSETS,
            END_PRODUCT,
            INVISIBLE_PRODUCTS,
            AUTO_ADDED,
            AUTO_SPAN,
            NON_CRITICAL,
            INVISIBLE,
            PRODUCT,
            MITER_CUT,
            IGNORE_AUTO_ADD_DELETE_RESTRICTION,
        ]
    }

    /// Resolve a (sheet, name) pair from external input to a known key.
    pub fn lookup(sheet: &str, name: &str) -> Option<PropKey> {
        all()
            .iter()
            .copied()
            .find(|k| k.sheet == sheet && k.name == name)
    }
}

/// Axis-aligned bounding box in local coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Unit box centered at the origin.
    pub fn unit() -> Self {
        Self {
            min: DVec3::splat(-0.5),
            max: DVec3::splat(0.5),
        }
    }

    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Check that `other` lies entirely inside this box.
    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.min.z <= other.min.z
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
            && self.max.z >= other.max.z
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }

    pub fn translated(&self, offset: DVec3) -> Aabb {
        Aabb {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    pub fn scaled(&self, factors: DVec3) -> Aabb {
        let center = self.center();
        let half = (self.size() * factors) * 0.5;
        Aabb {
            min: center - half,
            max: center + half,
        }
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::unit()
    }
}

/// A node in the scene graph.
///
/// Parent/child links are kept mutually consistent by [`SceneGraph`]
/// operations; rules mutate position, scale, rotation, and properties in
/// place during validation.
///
/// [`SceneGraph`]: super::graph::SceneGraph
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub parent: Option<EntityId>,
    pub children: Vec<EntityId>,
    pub props: HashMap<PropKey, PropValue>,

    /// Shadow placeholder: exists only to be replaced by a real placement.
    pub shadow: bool,
    /// Concrete model geometry (as opposed to organizational nodes).
    pub model: bool,
    /// Zone container: defines a coordinate frame and placement bounds.
    pub zone: bool,

    /// Kit controller this entity belongs to, if any.
    pub kit: Option<EntityId>,
    /// Template controller this entity belongs to, if any.
    pub template: Option<EntityId>,

    /// Position in the parent's local frame.
    pub position: DVec3,
    pub rotation: DQuat,
    pub scale: DVec3,
    /// Unscaled local bounds.
    pub bounds: Aabb,
}

impl Entity {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            props: HashMap::new(),
            shadow: false,
            model: false,
            zone: false,
            kit: None,
            template: None,
            position: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            scale: DVec3::ONE,
            bounds: Aabb::unit(),
        }
    }

    pub fn set_prop(&mut self, key: PropKey, value: PropValue) {
        self.props.insert(key, value);
    }

    /// Boolean property, treating a missing or mistyped value as absent.
    pub fn bool_prop(&self, key: PropKey) -> Option<bool> {
        match self.props.get(&key) {
            Some(PropValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Boolean property defaulted to false; the permissive-default form
    /// most rules want.
    pub fn flag(&self, key: PropKey) -> bool {
        self.bool_prop(key).unwrap_or(false)
    }

    pub fn int_prop(&self, key: PropKey) -> Option<i64> {
        match self.props.get(&key) {
            Some(PropValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn float_prop(&self, key: PropKey) -> Option<f64> {
        match self.props.get(&key) {
            Some(PropValue::Float(v)) => Some(*v),
            Some(PropValue::Int(v)) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn text_prop(&self, key: PropKey) -> Option<&str> {
        match self.props.get(&key) {
            Some(PropValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn floats_prop(&self, key: PropKey) -> Option<&[f64]> {
        match self.props.get(&key) {
            Some(PropValue::FloatList(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn texts_prop(&self, key: PropKey) -> Option<&[String]> {
        match self.props.get(&key) {
            Some(PropValue::TextList(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Local bounds size with the entity's scale applied.
    pub fn scaled_size(&self) -> DVec3 {
        self.bounds.size() * self.scale
    }

    /// Whether any auto-add strategy is configured on this entity.
    pub fn can_auto_add(&self) -> bool {
        self.text_prop(keys::SPAN_PRODUCT).is_some()
            || self.text_prop(keys::COLLISION_PRODUCT).is_some()
            || self.floats_prop(keys::POSITION_OFFSETS).is_some()
            || self.text_prop(keys::END_PRODUCT).is_some()
            || self.texts_prop(keys::INVISIBLE_PRODUCTS).is_some()
    }

    pub fn is_auto_added(&self) -> bool {
        self.flag(keys::AUTO_ADDED)
    }

    pub fn is_auto_span(&self) -> bool {
        self.flag(keys::AUTO_SPAN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prop_accessors() {
        let mut e = Entity::new(EntityId(1));
        e.set_prop(keys::USES_SNAPS, PropValue::Bool(true));
        e.set_prop(keys::SNAP_INCREMENT, PropValue::Float(0.05));
        e.set_prop(
            keys::SNAP_VALUES,
            PropValue::FloatList(vec![0.0, 0.1, 0.2]),
        );
        e.set_prop(
            keys::CLASSIFICATION,
            PropValue::TextList(vec!["wall".to_string()]),
        );

        assert!(e.flag(keys::USES_SNAPS));
        assert_eq!(e.float_prop(keys::SNAP_INCREMENT), Some(0.05));
        assert_eq!(e.floats_prop(keys::SNAP_VALUES).unwrap().len(), 3);
        assert_eq!(e.texts_prop(keys::CLASSIFICATION).unwrap()[0], "wall");
    }

    #[test]
    fn test_missing_prop_is_permissive_default() {
        let e = Entity::new(EntityId(1));
        assert!(!e.flag(keys::USES_SNAPS));
        assert_eq!(e.float_prop(keys::SNAP_INCREMENT), None);
        assert!(!e.can_auto_add());
    }

    #[test]
    fn test_mistyped_prop_reads_as_absent() {
        let mut e = Entity::new(EntityId(1));
        e.set_prop(keys::SNAP_INCREMENT, PropValue::Text("oops".to_string()));
        assert_eq!(e.float_prop(keys::SNAP_INCREMENT), None);
    }

    #[test]
    fn test_int_coerces_to_float() {
        let mut e = Entity::new(EntityId(1));
        e.set_prop(keys::SNAP_INCREMENT, PropValue::Int(2));
        assert_eq!(e.float_prop(keys::SNAP_INCREMENT), Some(2.0));
    }

    #[test]
    fn test_keys_lookup() {
        assert_eq!(
            keys::lookup("snapping", "uses_snaps"),
            Some(keys::USES_SNAPS)
        );
        assert_eq!(keys::lookup("snapping", "nope"), None);
    }

    #[test]
    fn test_aabb_contains_and_intersects() {
        let outer = Aabb::new(DVec3::splat(-2.0), DVec3::splat(2.0));
        let inner = Aabb::new(DVec3::splat(-1.0), DVec3::splat(1.0));
        let apart = inner.translated(DVec3::new(10.0, 0.0, 0.0));

        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(outer.intersects(&inner));
        assert!(!outer.intersects(&apart));
    }

    #[test]
    fn test_scaled_size() {
        let mut e = Entity::new(EntityId(1));
        e.bounds = Aabb::new(DVec3::new(-1.0, 0.0, -0.5), DVec3::new(1.0, 2.0, 0.5));
        e.scale = DVec3::new(2.0, 1.0, 1.0);
        assert_eq!(e.scaled_size(), DVec3::new(4.0, 2.0, 1.0));
    }
}
