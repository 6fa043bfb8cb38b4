//! In-process backend
//!
//! Keeps pets and images in memory. Counts calls per operation and can
//! inject failures or latency, which makes it the collaborator of choice for
//! tests and for running the binary without a server.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{Result, SyncError};
use crate::models::{ImageUpload, NewPet, Pet, PetPatch, Species};
use crate::remote::{ImageStore, RemoteCollection};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// == Operation ==
/// Remote operations, for counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOp {
    List,
    Fetch,
    Create,
    Update,
    Delete,
}

// == In-Memory Pet API ==
/// Pet backend living in process memory.
#[derive(Debug, Default)]
pub struct InMemoryPetApi {
    pets: Mutex<Vec<Pet>>,
    next_id: AtomicU64,
    calls: Mutex<HashMap<ApiOp, usize>>,
    failures: Mutex<HashMap<ApiOp, SyncError>>,
    delays: Mutex<HashMap<ApiOp, Duration>>,
}

impl InMemoryPetApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-populated with `pets`.
    pub fn with_pets(pets: Vec<Pet>) -> Self {
        let api = Self::new();
        *lock(&api.pets) = pets;
        api
    }

    /// Builds a pet record without going through `create`.
    pub fn pet(owner_id: &str, id: &str, name: &str) -> Pet {
        let now = Utc::now();
        Pet {
            id: id.to_string(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            species: Species::Dog,
            breed: None,
            birth_date: None,
            weight_kg: None,
            image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Inserts or replaces a pet server-side, bypassing call counting.
    pub fn upsert(&self, pet: Pet) {
        let mut pets = lock(&self.pets);
        match pets.iter().position(|p| p.id == pet.id) {
            Some(index) => pets[index] = pet,
            None => pets.push(pet),
        }
    }

    /// Removes a pet server-side, bypassing call counting.
    pub fn remove(&self, id: &str) -> Option<Pet> {
        let mut pets = lock(&self.pets);
        let index = pets.iter().position(|pet| pet.id == id)?;
        Some(pets.remove(index))
    }

    /// Server-side contents.
    pub fn pets(&self) -> Vec<Pet> {
        lock(&self.pets).clone()
    }

    /// Number of calls made for `op`.
    pub fn calls(&self, op: ApiOp) -> usize {
        lock(&self.calls).get(&op).copied().unwrap_or(0)
    }

    /// Total number of calls across all operations.
    pub fn total_calls(&self) -> usize {
        lock(&self.calls).values().sum()
    }

    /// Makes every call to `op` fail with `error` until cleared.
    pub fn fail(&self, op: ApiOp, error: SyncError) {
        lock(&self.failures).insert(op, error);
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// Delays responses to `op`; the result is captured before the delay.
    pub fn set_delay(&self, op: ApiOp, delay: Duration) {
        lock(&self.delays).insert(op, delay);
    }

    async fn respond<T>(&self, op: ApiOp, result: Result<T>) -> Result<T> {
        let delay = lock(&self.delays).get(&op).copied().unwrap_or_default();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    fn begin(&self, op: ApiOp) -> Result<()> {
        *lock(&self.calls).entry(op).or_insert(0) += 1;
        match lock(&self.failures).get(&op) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn not_found(id: &str) -> SyncError {
        SyncError::NotFound(format!("pet {}", id))
    }
}

#[async_trait]
impl RemoteCollection for InMemoryPetApi {
    type Item = Pet;
    type Input = NewPet;
    type Patch = PetPatch;

    async fn list(&self, owner_id: &str) -> Result<Vec<Pet>> {
        self.begin(ApiOp::List)?;
        let snapshot: Vec<Pet> = lock(&self.pets)
            .iter()
            .filter(|pet| pet.owner_id == owner_id)
            .cloned()
            .collect();
        self.respond(ApiOp::List, Ok(snapshot)).await
    }

    async fn fetch(&self, id: &str) -> Result<Pet> {
        self.begin(ApiOp::Fetch)?;
        let found = lock(&self.pets)
            .iter()
            .find(|pet| pet.id == id)
            .cloned()
            .ok_or_else(|| Self::not_found(id));
        self.respond(ApiOp::Fetch, found).await
    }

    async fn create(&self, input: &NewPet) -> Result<Pet> {
        self.begin(ApiOp::Create)?;
        if input.name.trim().is_empty() {
            return Err(SyncError::Validation("name must not be empty".to_string()));
        }

        let id = format!("pet-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let now = Utc::now();
        let pet = Pet {
            id,
            owner_id: input.owner_id.clone(),
            name: input.name.clone(),
            species: input.species,
            breed: input.breed.clone(),
            birth_date: input.birth_date,
            weight_kg: input.weight_kg,
            image_url: input.image_url.clone(),
            created_at: now,
            updated_at: now,
        };
        lock(&self.pets).push(pet.clone());
        Ok(pet)
    }

    async fn update(&self, id: &str, patch: &PetPatch) -> Result<Pet> {
        self.begin(ApiOp::Update)?;
        if patch.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(SyncError::Validation("name must not be empty".to_string()));
        }

        let mut pets = lock(&self.pets);
        let pet = pets
            .iter_mut()
            .find(|pet| pet.id == id)
            .ok_or_else(|| Self::not_found(id))?;
        patch.apply_to(pet);
        Ok(pet.clone())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.begin(ApiOp::Delete)?;
        let mut pets = lock(&self.pets);
        let before = pets.len();
        pets.retain(|pet| pet.id != id);
        if pets.len() == before {
            return Err(Self::not_found(id));
        }
        Ok(())
    }
}

// == In-Memory Image Store ==
/// Image store keeping uploaded URLs in memory.
#[derive(Debug, Default)]
pub struct InMemoryImageStore {
    stored: Mutex<HashSet<String>>,
    deleted: Mutex<Vec<String>>,
    next_id: AtomicU64,
    fail_uploads: Mutex<Option<SyncError>>,
    fail_deletes: Mutex<Option<SyncError>>,
}

impl InMemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, url: &str) -> bool {
        lock(&self.stored).contains(url)
    }

    /// URLs deleted so far, in order.
    pub fn deleted(&self) -> Vec<String> {
        lock(&self.deleted).clone()
    }

    pub fn fail_uploads(&self, error: Option<SyncError>) {
        *lock(&self.fail_uploads) = error;
    }

    pub fn fail_deletes(&self, error: Option<SyncError>) {
        *lock(&self.fail_deletes) = error;
    }

    /// Registers an existing URL as stored.
    pub fn insert(&self, url: impl Into<String>) {
        lock(&self.stored).insert(url.into());
    }
}

#[async_trait]
impl ImageStore for InMemoryImageStore {
    async fn upload(&self, image: &ImageUpload) -> Result<String> {
        if let Some(error) = lock(&self.fail_uploads).clone() {
            return Err(error);
        }
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let url = format!("memory://images/{}/{}", n, image.file_name);
        lock(&self.stored).insert(url.clone());
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<()> {
        if let Some(error) = lock(&self.fail_deletes).clone() {
            return Err(error);
        }
        lock(&self.deleted).push(url.to_string());
        if lock(&self.stored).remove(url) {
            Ok(())
        } else {
            Err(SyncError::NotFound(format!("image {}", url)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_filters_by_owner() {
        let api = InMemoryPetApi::with_pets(vec![
            InMemoryPetApi::pet("u1", "p1", "Max"),
            InMemoryPetApi::pet("u2", "p2", "Luna"),
        ]);

        let pets = api.list("u1").await.unwrap();

        assert_eq!(pets.len(), 1);
        assert_eq!(pets[0].id, "p1");
        assert_eq!(api.calls(ApiOp::List), 1);
    }

    #[tokio::test]
    async fn test_create_assigns_ids() {
        let api = InMemoryPetApi::new();

        let a = api.create(&NewPet::new("u1", "A", Species::Dog)).await.unwrap();
        let b = api.create(&NewPet::new("u1", "B", Species::Cat)).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(api.pets().len(), 2);
    }

    #[tokio::test]
    async fn test_validation_and_not_found() {
        let api = InMemoryPetApi::new();

        let err = api.create(&NewPet::new("u1", " ", Species::Dog)).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));

        let err = api.update("nope", &PetPatch::name("X")).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));

        let err = api.delete("nope").await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let api = InMemoryPetApi::new();
        api.fail(ApiOp::List, SyncError::Network("offline".into()));

        assert!(api.list("u1").await.is_err());
        assert_eq!(api.calls(ApiOp::List), 1);

        api.clear_failures();
        assert!(api.list("u1").await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_bypasses_counters() {
        let api = InMemoryPetApi::with_pets(vec![InMemoryPetApi::pet("u1", "p1", "Max")]);

        assert_eq!(api.remove("p1").map(|pet| pet.name), Some("Max".to_string()));
        assert!(api.remove("p1").is_none());
        assert_eq!(api.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_image_store_round_trip() {
        let store = InMemoryImageStore::new();

        let url = store
            .upload(&ImageUpload::jpeg("max.jpg", vec![1, 2, 3]))
            .await
            .unwrap();
        assert!(store.contains(&url));

        store.delete(&url).await.unwrap();
        assert!(!store.contains(&url));
        assert_eq!(store.deleted(), vec![url]);
    }
}
