//! Traits describing a cacheable entity.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::KeyKind;
use crate::invalidation::EntityKind;

/// An entity held in a [`Repository`](crate::repository::Repository)
/// collection and cached as a JSON snapshot.
pub trait Entity:
    Clone + PartialEq + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Kind used to look up cascade rules.
    const KIND: EntityKind;
    /// Key kind of the owner-scoped collection snapshot.
    const COLLECTION_KEY: KeyKind;
    /// Key kind of a single-entity snapshot.
    const DETAIL_KEY: KeyKind;

    /// Server-assigned identifier, unique within a collection.
    fn id(&self) -> &str;

    /// URL of an image owned by this entity, deleted along with it.
    fn image_url(&self) -> Option<&str> {
        None
    }
}

/// Create and patch payloads that can reference an uploaded image.
pub trait AttachImage {
    fn attach_image(&mut self, url: String);
}
