//! Pet models
//!
//! The pet profile as returned by the backend, plus the create and patch
//! payloads sent to it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::KeyKind;
use crate::invalidation::EntityKind;
use crate::repository::{AttachImage, Entity};

/// Animal species supported by the nutrition tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    Dog,
    Cat,
}

/// A pet profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub species: Species,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Pet {
    const KIND: EntityKind = EntityKind::Pet;
    const COLLECTION_KEY: KeyKind = KeyKind::PetCollection;
    const DETAIL_KEY: KeyKind = KeyKind::PetDetail;

    fn id(&self) -> &str {
        &self.id
    }

    fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }
}

/// Payload for `POST /pets`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPet {
    pub owner_id: String,
    pub name: String,
    pub species: Species,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl NewPet {
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>, species: Species) -> Self {
        Self {
            owner_id: owner_id.into(),
            name: name.into(),
            species,
            breed: None,
            birth_date: None,
            weight_kg: None,
            image_url: None,
        }
    }
}

impl AttachImage for NewPet {
    fn attach_image(&mut self, url: String) {
        self.image_url = Some(url);
    }
}

/// Payload for `PATCH /pets/{id}`; only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PetPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species: Option<Species>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl PetPatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Applies the set fields to `pet`, bumping `updated_at`.
    pub fn apply_to(&self, pet: &mut Pet) {
        if let Some(name) = &self.name {
            pet.name = name.clone();
        }
        if let Some(species) = self.species {
            pet.species = species;
        }
        if let Some(breed) = &self.breed {
            pet.breed = Some(breed.clone());
        }
        if let Some(birth_date) = self.birth_date {
            pet.birth_date = Some(birth_date);
        }
        if let Some(weight) = self.weight_kg {
            pet.weight_kg = Some(weight);
        }
        if let Some(url) = &self.image_url {
            pet.image_url = Some(url.clone());
        }
        pet.updated_at = Utc::now();
    }
}

impl AttachImage for PetPatch {
    fn attach_image(&mut self, url: String) {
        self.image_url = Some(url);
    }
}
