//! Remote Collaborators
//!
//! Typed contracts for the backend API and the image store, with an HTTP
//! implementation and an in-process one.
//!
//! # Pet endpoints
//! - `GET /pets?owner_id=` - List an owner's pets
//! - `GET /pets/{id}` - Fetch one pet
//! - `POST /pets` - Create a pet
//! - `PATCH /pets/{id}` - Patch a pet
//! - `DELETE /pets/{id}` - Delete a pet

mod http;
mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ImageUpload, NewPet, Pet, PetPatch};
use crate::repository::Entity;

pub use http::{HttpImageStore, HttpPetApi};
pub use memory::{ApiOp, InMemoryImageStore, InMemoryPetApi};

// == Remote Collection ==
/// CRUD contract for one owner-scoped entity collection.
#[async_trait]
pub trait RemoteCollection: Send + Sync + 'static {
    type Item: Entity;
    type Input: Send + Sync + 'static;
    type Patch: Send + Sync + 'static;

    /// Lists every entity belonging to `owner_id`.
    async fn list(&self, owner_id: &str) -> Result<Vec<Self::Item>>;

    /// Fetches one entity.
    async fn fetch(&self, id: &str) -> Result<Self::Item>;

    async fn create(&self, input: &Self::Input) -> Result<Self::Item>;

    async fn update(&self, id: &str, patch: &Self::Patch) -> Result<Self::Item>;

    async fn delete(&self, id: &str) -> Result<()>;
}

/// Object-safe pet API, implemented by both backends.
pub type DynPetApi = dyn RemoteCollection<Item = Pet, Input = NewPet, Patch = PetPatch>;

// == Image Store ==
/// Opaque image upload/delete collaborator.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Uploads the image and returns its public URL.
    async fn upload(&self, image: &ImageUpload) -> Result<String>;

    async fn delete(&self, url: &str) -> Result<()>;
}
