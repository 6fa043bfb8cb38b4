//! Invalidation Coordinator
//!
//! Maps a mutation on one entity to the cached artifacts derived from it
//! and drops them, so the next read recomputes from the server.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::cache::{CacheKey, KeyKind, KeyPattern, SharedCache};

// == Entity Kind ==
/// Kinds of entity whose mutations cascade into the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Pet,
}

impl EntityKind {
    /// Key kind of the entity's own detail snapshot.
    pub fn detail_key(&self) -> KeyKind {
        match self {
            EntityKind::Pet => KeyKind::PetDetail,
        }
    }
}

// == Dependent ==
/// Template for a group of keys derived from a mutated entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependent {
    /// Keys scoped to the mutated entity id; every kind when None
    Entity(Option<KeyKind>),
    /// Owner-level aggregates of one kind
    Owner(KeyKind),
}

impl Dependent {
    /// Substitutes the mutated entity's ids into the template.
    pub fn pattern(&self, entity_id: &str, owner_id: &str) -> KeyPattern {
        match self {
            Dependent::Entity(None) => KeyPattern::any().owner(owner_id).entity(entity_id),
            Dependent::Entity(Some(kind)) => KeyPattern::any()
                .kind(*kind)
                .owner(owner_id)
                .entity(entity_id),
            Dependent::Owner(kind) => KeyPattern::any().kind(*kind).owner(owner_id),
        }
    }
}

// == Cascade Rules ==
/// Table of `entity kind -> dependent key templates`.
#[derive(Debug, Clone, Default)]
pub struct CascadeRules {
    rules: HashMap<EntityKind, Vec<Dependent>>,
}

impl CascadeRules {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in table.
    ///
    /// A pet cascades to every key carrying its id (scan history, nutrition
    /// trends) and to the owner's cross-pet summaries.
    pub fn standard() -> Self {
        Self::empty()
            .with_rule(EntityKind::Pet, Dependent::Entity(None))
            .with_rule(EntityKind::Pet, Dependent::Owner(KeyKind::OwnerSummary))
    }

    pub fn with_rule(mut self, kind: EntityKind, dependent: Dependent) -> Self {
        self.rules.entry(kind).or_default().push(dependent);
        self
    }

    pub fn dependents(&self, kind: EntityKind) -> &[Dependent] {
        self.rules.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

// == Coordinator ==
/// Applies [`CascadeRules`] against the shared cache.
#[derive(Debug, Clone)]
pub struct InvalidationCoordinator {
    cache: SharedCache,
    rules: Arc<CascadeRules>,
}

impl InvalidationCoordinator {
    pub fn new(cache: SharedCache, rules: CascadeRules) -> Self {
        Self {
            cache,
            rules: Arc::new(rules),
        }
    }

    /// Coordinator using [`CascadeRules::standard`].
    pub fn standard(cache: SharedCache) -> Self {
        Self::new(cache, CascadeRules::standard())
    }

    /// Patterns that a mutation of `entity_id` invalidates, own key excluded.
    pub fn patterns_for(&self, kind: EntityKind, entity_id: &str, owner_id: &str) -> Vec<KeyPattern> {
        self.rules
            .dependents(kind)
            .iter()
            .map(|dependent| dependent.pattern(entity_id, owner_id))
            .collect()
    }

    // == On Mutated ==
    /// Drops the entity's own detail snapshot and every dependent key.
    ///
    /// Idempotent; returns the number of entries removed.
    pub fn on_mutated(&self, kind: EntityKind, entity_id: &str, owner_id: &str) -> usize {
        let own_key = CacheKey::entity(kind.detail_key(), owner_id, entity_id);
        let mut removed = usize::from(self.cache.invalidate(&own_key));

        for pattern in self.patterns_for(kind, entity_id, owner_id) {
            removed += self.cache.invalidate_matching(&pattern);
        }

        debug!(
            "Mutation of {:?} {} invalidated {} cache entries",
            kind, entity_id, removed
        );
        removed
    }
}
