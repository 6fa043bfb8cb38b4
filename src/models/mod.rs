//! Domain models exchanged with the remote API
//!
//! Entities are cached as JSON snapshots, so every model is serde-enabled.

pub mod image;
pub mod pet;

// Re-export commonly used types
pub use image::ImageUpload;
pub use pet::{NewPet, Pet, PetPatch, Species};
