//! Cache Key Module
//!
//! Structured cache keys and the patterns used to invalidate groups of them.

use std::fmt;

// == Key Kind ==
/// The kind of artifact a cache entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// All pets belonging to one owner
    PetCollection,
    /// A single pet
    PetDetail,
    /// Label scans recorded for one pet
    ScanHistory,
    /// Nutrition trend computed for one pet
    NutritionTrend,
    /// Aggregate views spanning every pet of an owner
    OwnerSummary,
    /// The signed-in user's profile
    UserProfile,
}

impl KeyKind {
    /// Every kind, in a stable order.
    pub const ALL: [KeyKind; 6] = [
        KeyKind::PetCollection,
        KeyKind::PetDetail,
        KeyKind::ScanHistory,
        KeyKind::NutritionTrend,
        KeyKind::OwnerSummary,
        KeyKind::UserProfile,
    ];

    /// Stable prefix used in the string form of a key.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::PetCollection => "pets",
            KeyKind::PetDetail => "pet",
            KeyKind::ScanHistory => "scans",
            KeyKind::NutritionTrend => "nutrition",
            KeyKind::OwnerSummary => "summary",
            KeyKind::UserProfile => "profile",
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Cache Key ==
/// Identifies one cached value.
///
/// The string form is `kind[:owner=<id>][:id=<id>]`; equal keys always
/// render identically, so exact and pattern invalidation agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: KeyKind,
    owner_id: Option<String>,
    entity_id: Option<String>,
}

impl CacheKey {
    /// Creates a key from its raw components.
    pub fn new(kind: KeyKind, owner_id: Option<String>, entity_id: Option<String>) -> Self {
        Self {
            kind,
            owner_id,
            entity_id,
        }
    }

    /// Key for an owner-scoped collection.
    pub fn collection(kind: KeyKind, owner_id: impl Into<String>) -> Self {
        Self::new(kind, Some(owner_id.into()), None)
    }

    /// Key for one entity, scoped to its owner.
    pub fn entity(kind: KeyKind, owner_id: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::new(kind, Some(owner_id.into()), Some(entity_id.into()))
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    /// True if the key is scoped to the given owner.
    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner_id.as_deref() == Some(owner_id)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_str())?;
        if let Some(owner) = &self.owner_id {
            write!(f, ":owner={}", owner)?;
        }
        if let Some(id) = &self.entity_id {
            write!(f, ":id={}", id)?;
        }
        Ok(())
    }
}

// == Key Pattern ==
/// Selects a group of keys for invalidation.
///
/// Structured filters compare key components exactly, so an entity id can
/// never accidentally match inside another id. `containing` is the escape
/// hatch for ad-hoc substring matching on the rendered key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyPattern {
    kind: Option<KeyKind>,
    owner_id: Option<String>,
    entity_id: Option<String>,
    substring: Option<String>,
}

impl KeyPattern {
    /// Matches every key.
    pub fn any() -> Self {
        Self::default()
    }

    /// Matches keys whose rendered form contains `needle`.
    pub fn containing(needle: impl Into<String>) -> Self {
        Self {
            substring: Some(needle.into()),
            ..Self::default()
        }
    }

    /// Restricts the pattern to one kind.
    pub fn kind(mut self, kind: KeyKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Restricts the pattern to one owner.
    pub fn owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Restricts the pattern to one entity id.
    pub fn entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Returns true if `key` satisfies every filter set on the pattern.
    pub fn matches(&self, key: &CacheKey) -> bool {
        if let Some(kind) = self.kind {
            if key.kind != kind {
                return false;
            }
        }
        if let Some(owner) = &self.owner_id {
            if key.owner_id.as_deref() != Some(owner.as_str()) {
                return false;
            }
        }
        if let Some(id) = &self.entity_id {
            if key.entity_id.as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        match &self.substring {
            Some(needle) => key.to_string().contains(needle.as_str()),
            None => true,
        }
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Some(kind) => f.write_str(kind.as_str())?,
            None => f.write_str("*")?,
        }
        if let Some(owner) = &self.owner_id {
            write!(f, ":owner={}", owner)?;
        }
        if let Some(id) = &self.entity_id {
            write!(f, ":id={}", id)?;
        }
        if let Some(needle) = &self.substring {
            write!(f, "~{}", needle)?;
        }
        Ok(())
    }
}
