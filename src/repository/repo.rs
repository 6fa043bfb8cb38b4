//! Entity Repository
//!
//! Read-through / write-through access to one owner-scoped collection.
//! The repository owns the in-memory view; the cache only ever receives
//! serialized copies of it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheKey;
use crate::error::{Result, SyncError};
use crate::models::ImageUpload;
use crate::remote::{ImageStore, RemoteCollection};
use crate::repository::{
    AttachImage, Entity, ManagedRepository, RefreshOutcome, RepositoryContext, RepositoryState,
};
use crate::session::SessionTicket;

/// Runs `fut` under a deadline, mapping expiry to [`SyncError::Timeout`].
async fn with_timeout<R>(limit: Duration, fut: impl Future<Output = Result<R>>) -> Result<R> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::Timeout(Some(limit))),
    }
}

// == Repository ==
/// Cache-backed repository for the collection served by `A`.
pub struct Repository<A: RemoteCollection + ?Sized> {
    name: &'static str,
    api: Arc<A>,
    images: Option<Arc<dyn ImageStore>>,
    ctx: RepositoryContext,
    state: Arc<watch::Sender<RepositoryState<A::Item>>>,
    /// Serializes background checks so back-to-back calls share one fetch
    refresh_lock: Arc<Mutex<()>>,
}

impl<A: RemoteCollection + ?Sized> Clone for Repository<A> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            api: Arc::clone(&self.api),
            images: self.images.clone(),
            ctx: self.ctx.clone(),
            state: Arc::clone(&self.state),
            refresh_lock: Arc::clone(&self.refresh_lock),
        }
    }
}

impl<A: RemoteCollection + ?Sized> Repository<A> {
    // == Constructor ==
    /// Creates an empty repository.
    ///
    /// # Arguments
    /// * `name` - Label used in logs
    /// * `api` - Remote collaborator for the collection
    /// * `ctx` - Shared cache, session, invalidation and policy
    pub fn new(name: &'static str, api: Arc<A>, ctx: RepositoryContext) -> Self {
        let (state, _) = watch::channel(RepositoryState::default());
        Self {
            name,
            api,
            images: None,
            ctx,
            state: Arc::new(state),
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Attaches the collaborator that stores entity-owned images.
    pub fn with_images(mut self, images: Arc<dyn ImageStore>) -> Self {
        self.images = Some(images);
        self
    }

    /// Label used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    // == Observation ==
    /// Receiver notified whenever the view state changes.
    pub fn subscribe(&self) -> watch::Receiver<RepositoryState<A::Item>> {
        self.state.subscribe()
    }

    /// Current view state.
    pub fn state(&self) -> RepositoryState<A::Item> {
        self.state.borrow().clone()
    }

    /// Current collection.
    pub fn items(&self) -> Arc<Vec<A::Item>> {
        Arc::clone(&self.state.borrow().items)
    }

    /// True while the current collection holds no items.
    pub fn is_empty(&self) -> bool {
        self.state.borrow().items.is_empty()
    }

    /// Drops the in-memory view back to `Empty`.
    pub fn reset(&self) {
        self.state.send_modify(|state| state.reset());
    }

    // == Keys ==
    fn collection_key(owner_id: &str) -> CacheKey {
        CacheKey::collection(<A::Item as Entity>::COLLECTION_KEY, owner_id)
    }

    fn detail_key(owner_id: &str, id: &str) -> CacheKey {
        CacheKey::entity(<A::Item as Entity>::DETAIL_KEY, owner_id, id)
    }

    fn require_ticket(&self) -> Result<SessionTicket> {
        self.ctx
            .session
            .ticket()
            .ok_or_else(|| SyncError::Authentication("no active session".to_string()))
    }

    // == Commit ==
    /// Applies `f` to the state only if `ticket` is still the active session.
    ///
    /// The check runs under the state lock, so a logout either happens
    /// before (and the change is dropped) or after (and its reset wins).
    fn commit(
        &self,
        ticket: &SessionTicket,
        f: impl FnOnce(&mut RepositoryState<A::Item>) -> bool,
    ) -> bool {
        let mut applied = false;
        self.state.send_if_modified(|state| {
            if !self.ctx.session.is_current(ticket) {
                return false;
            }
            applied = true;
            f(state)
        });
        if !applied {
            debug!("{}: dropping result for a session that ended", self.name);
        }
        applied
    }

    /// Writes the collection snapshot and one detail snapshot per item.
    fn persist_collection(&self, owner_id: &str, items: &[A::Item]) {
        let policy = &self.ctx.policy;
        self.ctx
            .cache
            .set(Self::collection_key(owner_id), items, Some(policy.collection_ttl));
        for item in items {
            self.ctx.cache.set(
                Self::detail_key(owner_id, item.id()),
                item,
                Some(policy.detail_ttl),
            );
        }
    }

    /// Drops the cached snapshots and dependents of every entity in
    /// `previous` that no longer appears in `current`.
    fn drop_vanished(&self, owner_id: &str, previous: &[A::Item], current: &[A::Item]) -> usize {
        let mut dropped = 0;
        for item in previous {
            if current.iter().all(|kept| kept.id() != item.id()) {
                self.ctx
                    .invalidation
                    .on_mutated(<A::Item as Entity>::KIND, item.id(), owner_id);
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!("{}: {} entities vanished server-side", self.name, dropped);
        }
        dropped
    }

    fn record_error(&self, ticket: &SessionTicket, error: &SyncError) {
        if error.is_authentication() {
            return;
        }
        self.commit(ticket, |state| {
            state.last_error = Some(error.clone());
            true
        });
    }

    // == Load ==
    /// Fire-and-forget variant of [`load_async`](Self::load_async).
    pub fn load(&self, force_refresh: bool) -> JoinHandle<()> {
        let repo = self.clone();
        tokio::spawn(async move {
            if let Err(e) = repo.load_async(force_refresh).await {
                warn!("{}: load failed: {}", repo.name, e);
            }
        })
    }

    /// Returns the collection, from memory, cache or network in that order.
    ///
    /// Without a session the view is reset and nothing is fetched. An
    /// authentication failure is treated as "no data".
    pub async fn load_async(&self, force_refresh: bool) -> Result<Arc<Vec<A::Item>>> {
        let Some(ticket) = self.ctx.session.ticket() else {
            debug!("{}: no authenticated owner, resetting", self.name);
            self.reset();
            return Ok(Arc::new(Vec::new()));
        };

        if !force_refresh {
            let in_memory = {
                let state = self.state.borrow();
                (state.is_hydrated_for(ticket.owner_id()) && !state.items.is_empty())
                    .then(|| Arc::clone(&state.items))
            };
            if let Some(items) = in_memory {
                self.schedule_background_check();
                return Ok(items);
            }

            let key = Self::collection_key(ticket.owner_id());
            if let Some(cached) = self.ctx.cache.get::<Vec<A::Item>>(&key) {
                if !cached.is_empty() {
                    debug!("{}: serving {} items from cache", self.name, cached.len());
                    let applied = self.commit(&ticket, |state| {
                        state.replace_items(cached);
                        state.owner_id = Some(ticket.owner_id().to_string());
                        state.last_error = None;
                        true
                    });
                    if applied {
                        self.schedule_background_check();
                    }
                    return Ok(self.items());
                }
            }
        }

        self.fetch_collection(&ticket).await
    }

    async fn fetch_collection(&self, ticket: &SessionTicket) -> Result<Arc<Vec<A::Item>>> {
        self.commit(ticket, |state| {
            state.is_loading = true;
            true
        });

        let owner_id = ticket.owner_id();
        let result = with_timeout(self.ctx.policy.request_timeout, self.api.list(owner_id)).await;

        match result {
            Ok(items) => {
                info!("{}: loaded {} items from network", self.name, items.len());
                self.commit(ticket, |state| {
                    if state.is_hydrated_for(owner_id) {
                        self.drop_vanished(owner_id, &state.items, &items);
                    }
                    self.persist_collection(owner_id, &items);
                    state.replace_items(items);
                    state.owner_id = Some(owner_id.to_string());
                    state.is_loading = false;
                    state.last_error = None;
                    true
                });
                Ok(self.items())
            }
            Err(e) if e.is_authentication() => {
                info!("{}: authentication rejected during load, clearing", self.name);
                if self.ctx.session.is_current(ticket) {
                    self.reset();
                }
                Ok(Arc::new(Vec::new()))
            }
            Err(e) => {
                warn!("{}: load failed: {}", self.name, e);
                self.commit(ticket, |state| {
                    state.is_loading = false;
                    state.last_error = Some(e.clone());
                    true
                });
                Err(e)
            }
        }
    }

    // == Background Refresh ==
    fn schedule_background_check(&self) {
        let repo = self.clone();
        tokio::spawn(async move {
            repo.background_refresh().await;
        });
    }

    /// Revalidates the collection if its cached snapshot went stale.
    ///
    /// Never surfaces errors and never toggles `is_loading`. A result is
    /// discarded if the view changed while the call was in flight.
    pub async fn background_refresh(&self) -> RefreshOutcome {
        let Some(ticket) = self.ctx.session.ticket() else {
            return RefreshOutcome::Skipped;
        };
        let Ok(_guard) = self.refresh_lock.try_lock() else {
            debug!("{}: background check already in flight", self.name);
            return RefreshOutcome::Skipped;
        };

        let owner_id = ticket.owner_id();
        let base_version = {
            let state = self.state.borrow();
            if !state.is_hydrated_for(owner_id) {
                return RefreshOutcome::Skipped;
            }
            state.version
        };

        if self.ctx.cache.exists(&Self::collection_key(owner_id)) {
            debug!("{}: cached collection still fresh", self.name);
            return RefreshOutcome::Fresh;
        }

        self.commit(&ticket, |state| {
            state.is_background_refreshing = true;
            true
        });

        let result =
            with_timeout(self.ctx.policy.background_timeout, self.api.list(owner_id)).await;

        let outcome = match result {
            Ok(items) => {
                let mut outcome = RefreshOutcome::Discarded;
                self.commit(&ticket, |state| {
                    if state.version != base_version {
                        return false;
                    }
                    if *state.items == items {
                        self.persist_collection(owner_id, &items);
                        outcome = RefreshOutcome::Unchanged;
                        false
                    } else {
                        self.drop_vanished(owner_id, &state.items, &items);
                        self.persist_collection(owner_id, &items);
                        state.replace_items(items);
                        outcome = RefreshOutcome::Updated;
                        true
                    }
                });
                outcome
            }
            Err(e) => {
                warn!("{}: background refresh failed: {}", self.name, e);
                RefreshOutcome::Failed
            }
        };

        self.state.send_if_modified(|state| {
            std::mem::replace(&mut state.is_background_refreshing, false)
        });

        debug!("{}: background check finished: {:?}", self.name, outcome);
        outcome
    }

    // == Create ==
    /// Creates an entity; on success it joins the collection and the cache.
    ///
    /// On failure the view is unchanged apart from `last_error`.
    pub async fn create(&self, input: A::Input) -> Result<A::Item> {
        let ticket = self.require_ticket()?;

        match with_timeout(self.ctx.policy.request_timeout, self.api.create(&input)).await {
            Ok(entity) => {
                info!("{}: created {}", self.name, entity.id());
                self.apply_upsert(&ticket, &entity);
                Ok(entity)
            }
            Err(e) => {
                self.record_error(&ticket, &e);
                Err(e)
            }
        }
    }

    // == Update ==
    /// Patches an entity; on success the element is replaced in a new
    /// collection copy and its dependents are invalidated.
    pub async fn update(&self, id: &str, patch: A::Patch) -> Result<A::Item> {
        let ticket = self.require_ticket()?;

        match with_timeout(self.ctx.policy.request_timeout, self.api.update(id, &patch)).await {
            Ok(entity) => {
                info!("{}: updated {}", self.name, entity.id());
                self.apply_upsert(&ticket, &entity);
                Ok(entity)
            }
            Err(e) => {
                self.record_error(&ticket, &e);
                Err(e)
            }
        }
    }

    /// Replaces or appends `entity`, then writes through to the cache.
    fn apply_upsert(&self, ticket: &SessionTicket, entity: &A::Item) -> bool {
        let owner_id = ticket.owner_id();
        self.commit(ticket, |state| {
            let mut items = state.items.as_ref().clone();
            match items.iter().position(|item| item.id() == entity.id()) {
                Some(index) => items[index] = entity.clone(),
                None => items.push(entity.clone()),
            }

            self.ctx
                .invalidation
                .on_mutated(<A::Item as Entity>::KIND, entity.id(), owner_id);
            self.ctx.cache.set(
                Self::detail_key(owner_id, entity.id()),
                entity,
                Some(self.ctx.policy.detail_ttl),
            );
            self.write_collection(state, owner_id, &items);

            state.replace_items(items);
            state.last_error = None;
            true
        })
    }

    /// Rewrites the collection snapshot, or drops it when the view was never
    /// loaded and so cannot stand in for the full collection.
    fn write_collection(&self, state: &RepositoryState<A::Item>, owner_id: &str, items: &[A::Item]) {
        let key = Self::collection_key(owner_id);
        if state.is_hydrated_for(owner_id) {
            self.ctx
                .cache
                .set(key, items, Some(self.ctx.policy.collection_ttl));
        } else {
            self.ctx.cache.invalidate(&key);
        }
    }

    // == Delete ==
    /// Deletes an entity and its owned image.
    ///
    /// The image is resolved from memory or cache and deleted first; a
    /// failure there is logged only. A server-side `NotFound` counts as
    /// already deleted.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let ticket = self.require_ticket()?;

        if let (Some(images), Some(entity)) = (&self.images, self.get_by_id(id)) {
            if let Some(url) = entity.image_url() {
                let result = with_timeout(self.ctx.policy.request_timeout, images.delete(url)).await;
                if let Err(e) = result {
                    warn!("{}: failed to delete image {} of {}: {}", self.name, url, id, e);
                }
            }
        }

        match with_timeout(self.ctx.policy.request_timeout, self.api.delete(id)).await {
            Ok(()) => {
                info!("{}: deleted {}", self.name, id);
                self.apply_removal(&ticket, id);
                Ok(())
            }
            Err(SyncError::NotFound(_)) => {
                info!("{}: {} already gone server-side", self.name, id);
                self.apply_removal(&ticket, id);
                Ok(())
            }
            Err(e) => {
                self.record_error(&ticket, &e);
                Err(e)
            }
        }
    }

    fn apply_removal(&self, ticket: &SessionTicket, id: &str) -> bool {
        let owner_id = ticket.owner_id();
        self.commit(ticket, |state| {
            let items: Vec<A::Item> = state
                .items
                .iter()
                .filter(|item| item.id() != id)
                .cloned()
                .collect();

            self.ctx
                .invalidation
                .on_mutated(<A::Item as Entity>::KIND, id, owner_id);
            self.write_collection(state, owner_id, &items);

            state.replace_items(items);
            state.last_error = None;
            true
        })
    }

    // == Get By Id ==
    /// Looks an entity up in memory, then in the detail cache. Never touches
    /// the network.
    pub fn get_by_id(&self, id: &str) -> Option<A::Item> {
        let in_memory = self
            .state
            .borrow()
            .items
            .iter()
            .find(|item| item.id() == id)
            .cloned();
        if in_memory.is_some() {
            return in_memory;
        }

        let owner_id = self.ctx.session.owner_id()?;
        self.ctx.cache.get(&Self::detail_key(&owner_id, id))
    }

    /// Like [`get_by_id`](Self::get_by_id), falling back to the network and
    /// caching what it finds. Returns None rather than an error.
    pub async fn get_by_id_with_network_fallback(&self, id: &str) -> Option<A::Item> {
        if let Some(entity) = self.get_by_id(id) {
            return Some(entity);
        }

        let ticket = self.ctx.session.ticket()?;
        match with_timeout(self.ctx.policy.request_timeout, self.api.fetch(id)).await {
            Ok(entity) => {
                self.commit(&ticket, |_| {
                    self.ctx.cache.set(
                        Self::detail_key(ticket.owner_id(), id),
                        &entity,
                        Some(self.ctx.policy.detail_ttl),
                    );
                    false
                });
                Some(entity)
            }
            Err(e) => {
                debug!("{}: {} not found anywhere: {}", self.name, id, e);
                None
            }
        }
    }

    // == Refresh One ==
    /// Re-fetches one entity, bypassing the cache, and installs it.
    ///
    /// Used after a write elsewhere may have changed server-derived fields.
    pub async fn refresh(&self, id: &str) -> Result<A::Item> {
        let ticket = self.require_ticket()?;
        let owner_id = ticket.owner_id();

        match with_timeout(self.ctx.policy.request_timeout, self.api.fetch(id)).await {
            Ok(entity) => {
                self.commit(&ticket, |state| {
                    self.ctx.cache.set(
                        Self::detail_key(owner_id, id),
                        &entity,
                        Some(self.ctx.policy.detail_ttl),
                    );
                    let Some(index) = state.items.iter().position(|item| item.id() == id) else {
                        return false;
                    };
                    let mut items = state.items.as_ref().clone();
                    items[index] = entity.clone();
                    self.write_collection(state, owner_id, &items);
                    state.replace_items(items);
                    true
                });
                Ok(entity)
            }
            Err(e) => {
                self.record_error(&ticket, &e);
                Err(e)
            }
        }
    }
}

// == Image-aware mutations ==
impl<A> Repository<A>
where
    A: RemoteCollection + ?Sized,
    A::Input: AttachImage,
    A::Patch: AttachImage,
{
    fn image_store(&self) -> Result<Arc<dyn ImageStore>> {
        self.images
            .clone()
            .ok_or_else(|| SyncError::Validation("no image store configured".to_string()))
    }

    async fn upload(&self, ticket: &SessionTicket, image: &ImageUpload) -> Result<String> {
        let images = self.image_store()?;
        let result = with_timeout(self.ctx.policy.request_timeout, images.upload(image)).await;
        if let Err(e) = &result {
            self.record_error(ticket, e);
        }
        result
    }

    async fn discard_image(&self, url: &str) {
        if let Some(images) = &self.images {
            if let Err(e) = images.delete(url).await {
                warn!("{}: failed to delete image {}: {}", self.name, url, e);
            }
        }
    }

    /// Uploads `image`, then creates the entity referencing it.
    ///
    /// An upload failure aborts the create; if the create fails the upload
    /// is deleted again.
    pub async fn create_with_image(&self, mut input: A::Input, image: ImageUpload) -> Result<A::Item> {
        let ticket = self.require_ticket()?;
        let url = self.upload(&ticket, &image).await?;
        input.attach_image(url.clone());

        let result = self.create(input).await;
        if result.is_err() {
            self.discard_image(&url).await;
        }
        result
    }

    /// Uploads `image`, patches the entity to reference it, then deletes the
    /// image it replaced.
    pub async fn update_with_image(
        &self,
        id: &str,
        mut patch: A::Patch,
        image: ImageUpload,
    ) -> Result<A::Item> {
        let ticket = self.require_ticket()?;
        let previous = self
            .get_by_id(id)
            .and_then(|entity| entity.image_url().map(str::to_string));

        let url = self.upload(&ticket, &image).await?;
        patch.attach_image(url.clone());

        match self.update(id, patch).await {
            Ok(entity) => {
                if let Some(old) = previous.filter(|old| *old != url) {
                    self.discard_image(&old).await;
                }
                Ok(entity)
            }
            Err(e) => {
                self.discard_image(&url).await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl<A: RemoteCollection + ?Sized> ManagedRepository for Repository<A> {
    fn name(&self) -> &str {
        self.name
    }

    fn reset(&self) {
        Repository::reset(self);
    }

    fn is_empty(&self) -> bool {
        Repository::is_empty(self)
    }

    fn load(&self, force_refresh: bool) -> JoinHandle<()> {
        Repository::load(self, force_refresh)
    }

    async fn background_refresh(&self) -> RefreshOutcome {
        Repository::background_refresh(self).await
    }
}
