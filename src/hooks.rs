//! External presentation and construction hooks.
//!
//! Rules never format user-visible text: failures surface through
//! [`Presentation`] keyed by localized message identifiers, and new child
//! entities for the auto-add strategies come from an [`EntityBuilder`]
//! backed by the external catalog.

use crate::scene::Entity;

/// Localized message identifiers surfaced through the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    AutoAddFailed,
    IllegalPlacement,
    OutOfBounds,
    RestrictedParent,
    PermanentParentViolation,
    ReplaceConfirm,
    KitRemoveConfirm,
    DeleteRestricted,
    KitControllerLocked,
    EntityLocked,
    ScaleAdjusted,
}

impl MessageKey {
    /// The identifier handed to the external string-lookup service.
    pub fn token(self) -> &'static str {
        match self {
            MessageKey::AutoAddFailed => "warden.autoAdd.failed",
            MessageKey::IllegalPlacement => "warden.collision.illegal",
            MessageKey::OutOfBounds => "warden.bounds.outside",
            MessageKey::RestrictedParent => "warden.parent.restricted",
            MessageKey::PermanentParentViolation => "warden.parent.permanent",
            MessageKey::ReplaceConfirm => "warden.replace.confirm",
            MessageKey::KitRemoveConfirm => "warden.kit.removeConfirm",
            MessageKey::DeleteRestricted => "warden.autoAdd.deleteRestricted",
            MessageKey::KitControllerLocked => "warden.kit.controllerLocked",
            MessageKey::EntityLocked => "warden.entity.locked",
            MessageKey::ScaleAdjusted => "warden.scale.adjusted",
        }
    }
}

/// Fire-and-forget presentation callbacks.
///
/// `confirm` blocks for a modal answer; the other two must not block.
/// Implementations resolve the [`MessageKey`] token to localized text.
pub trait Presentation {
    fn status(&self, key: MessageKey);
    fn popup(&self, key: MessageKey);
    fn confirm(&self, key: MessageKey) -> bool;
}

/// Drops messages and accepts every confirmation. The default for headless
/// use and tests that do not observe presentation.
#[derive(Debug, Default)]
pub struct SilentPresentation;

impl Presentation for SilentPresentation {
    fn status(&self, _key: MessageKey) {}

    fn popup(&self, _key: MessageKey) {}

    fn confirm(&self, _key: MessageKey) -> bool {
        true
    }
}

/// Constructs new child entities from a catalog product key.
///
/// Returning `None` means the catalog cannot satisfy the product, which the
/// auto-add cascade treats as a strategy failure.
pub trait EntityBuilder {
    fn build(&self, product: &str) -> Option<Entity>;
}

/// A builder with an empty catalog. Any configured auto-add strategy fails
/// against it, which is the right behavior for replay runs without catalog
/// data.
#[derive(Debug, Default)]
pub struct NullBuilder;

impl EntityBuilder for NullBuilder {
    fn build(&self, _product: &str) -> Option<Entity> {
        None
    }
}
