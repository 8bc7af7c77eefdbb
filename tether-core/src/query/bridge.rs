//! QueryBridge Implementation
//!
//! A `QueryBridge<E>` backs one property with a live query: the rows of
//! entity type `E` that pass a filter, in a given sort order.
//!
//! # How It Works
//!
//! 1. On construction the bridge subscribes to a change bus.
//!
//! 2. `results` returns the cached rows, or runs the query against the
//!    bound context (else the default context) and caches the rows.
//!    A missing context or a failed fetch reads as an empty collection
//!    and is not cached, so the next read tries again.
//!
//! 3. When an event reports a change to `E` (insert, update and delete
//!    alike) the bridge clears its cache inside its envelope and the
//!    owner's mutation hook. Events about other entity types are ignored.
//!    A bridge with no bound context adopts the context that posted the
//!    save, if the event names one.
//!
//! Invalidation is eager: the cache is cleared when the event arrives,
//! and the query re-runs on the next read.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::change::ContextChange;
use super::context::{change_bus, default_context, fetch, PersistenceContext};
use super::descriptor::{FetchDescriptor, SortDescriptor, SortOrder};
use super::entity::{Entity, EntityType};
use crate::cache::{Animation, MutationEnvelope, Presenter, Transaction, ValueCache};
use crate::error::{BridgeError, Result};
use crate::notify::{Notifier, Subscription};
use crate::observe::{MutationRelay, ObservationBinding, ObservationHook, PropertyId};

struct QueryInner<E: Entity> {
    entity: EntityType,
    descriptor: FetchDescriptor<E>,
    context: RwLock<Option<Arc<dyn PersistenceContext>>>,
    cache: ValueCache<Vec<E>>,
    relay: MutationRelay,
    warned_missing_context: AtomicBool,
}

impl<E: Entity> QueryInner<E> {
    fn resolve_context(&self) -> Option<Arc<dyn PersistenceContext>> {
        self.context.read().clone().or_else(default_context)
    }

    fn run_query(&self) -> Result<Vec<E>> {
        let context = self
            .resolve_context()
            .ok_or_else(|| BridgeError::MissingContext {
                entity: self.entity.to_string(),
            })?;
        fetch(context.as_ref(), &self.descriptor)
    }

    fn results(&self) -> Vec<E> {
        match self.cache.try_read(|| self.run_query()) {
            Ok(rows) => rows,
            Err(err @ BridgeError::MissingContext { .. }) => {
                if !self.warned_missing_context.swap(true, Ordering::Relaxed) {
                    tracing::warn!(entity = %self.entity, error = %err, "query has no context; reading as empty");
                }
                Vec::new()
            }
            Err(err) => {
                tracing::debug!(entity = %self.entity, error = %err, "query failed; reading as empty");
                Vec::new()
            }
        }
    }

    fn on_change(&self, change: &ContextChange) {
        if !change.affects(&self.entity) {
            return;
        }
        if let Some(origin) = change.origin() {
            self.adopt(origin);
        }
        self.invalidate();
    }

    /// Use the context that posted a relevant save when none is bound.
    fn adopt(&self, origin: Arc<dyn PersistenceContext>) {
        let mut context = self.context.write();
        if context.is_none() {
            tracing::debug!(entity = %self.entity, "adopting the context that posted a save");
            *context = Some(origin);
        }
    }

    fn invalidate(&self) {
        tracing::debug!(entity = %self.entity, "query results invalidated");
        self.relay.mutate(&mut || self.cache.invalidate());
    }
}

/// A property bridged to a live query.
pub struct QueryBridge<E: Entity> {
    inner: Arc<QueryInner<E>>,
    _subscription: Subscription,
}

impl<E: Entity> QueryBridge<E> {
    /// Start configuring a bridge.
    pub fn builder() -> QueryBridgeBuilder<E> {
        QueryBridgeBuilder::new()
    }

    /// A bridge for `descriptor` listening on the process-wide change bus,
    /// with no envelope and no bound context.
    pub fn new(descriptor: FetchDescriptor<E>) -> Self {
        Self::assemble(
            descriptor,
            None,
            MutationEnvelope::Direct,
            None,
            &change_bus(),
        )
    }

    fn assemble(
        descriptor: FetchDescriptor<E>,
        context: Option<Arc<dyn PersistenceContext>>,
        envelope: MutationEnvelope,
        presenter: Option<Arc<dyn Presenter>>,
        changes: &Arc<Notifier<ContextChange>>,
    ) -> Self {
        let inner = Arc::new(QueryInner {
            entity: EntityType::of::<E>(),
            descriptor,
            context: RwLock::new(context),
            cache: ValueCache::new(),
            relay: MutationRelay::new(envelope, presenter),
            warned_missing_context: AtomicBool::new(false),
        });

        let weak: Weak<QueryInner<E>> = Arc::downgrade(&inner);
        let subscription = changes.subscribe(move |change: &ContextChange| {
            if let Some(inner) = weak.upgrade() {
                inner.on_change(change);
            }
        });

        Self {
            inner,
            _subscription: subscription,
        }
    }

    /// Register the owner's observation hook.
    ///
    /// The bridge keeps only a weak handle, so it never keeps `owner` alive.
    pub fn within_observation(
        &self,
        owner: Weak<dyn ObservationHook>,
        property: impl Into<PropertyId>,
    ) {
        self.inner
            .relay
            .bind(ObservationBinding::new(owner, property));
    }

    /// Current rows.
    pub fn results(&self) -> Vec<E> {
        self.inner.relay.will_access();
        self.inner.results()
    }

    /// Bind a context. It takes precedence over the default context.
    ///
    /// Cached rows came from the previous context, so they are invalidated.
    pub fn bind_context(&self, context: Arc<dyn PersistenceContext>) {
        *self.inner.context.write() = Some(context);
        self.inner.warned_missing_context.store(false, Ordering::Relaxed);
        self.inner.invalidate();
    }

    /// Invalidate now, as if a matching change had arrived.
    pub fn refresh(&self) {
        self.inner.invalidate();
    }

    /// The entity type this bridge queries.
    pub fn entity(&self) -> &EntityType {
        &self.inner.entity
    }

    /// The query's filter, sort order and paging.
    pub fn descriptor(&self) -> &FetchDescriptor<E> {
        &self.inner.descriptor
    }

    /// The envelope invalidations run in.
    pub fn envelope(&self) -> &MutationEnvelope {
        self.inner.relay.envelope()
    }

    /// Check if rows are cached.
    pub fn is_cached(&self) -> bool {
        self.inner.cache.is_populated()
    }
}

impl<E: Entity> Debug for QueryBridge<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBridge")
            .field("entity", &self.inner.entity)
            .field("descriptor", &self.inner.descriptor)
            .field("envelope", self.inner.relay.envelope())
            .field("cached", &self.is_cached())
            .finish()
    }
}

/// Builder for [`QueryBridge`].
pub struct QueryBridgeBuilder<E: Entity> {
    descriptor: FetchDescriptor<E>,
    context: Option<Arc<dyn PersistenceContext>>,
    transaction: Option<Transaction>,
    animation: Option<Animation>,
    presenter: Option<Arc<dyn Presenter>>,
    changes: Option<Arc<Notifier<ContextChange>>>,
}

impl<E: Entity> QueryBridgeBuilder<E> {
    fn new() -> Self {
        Self {
            descriptor: FetchDescriptor::new(),
            context: None,
            transaction: None,
            animation: None,
            presenter: None,
            changes: None,
        }
    }

    /// Replace the whole descriptor.
    pub fn descriptor(mut self, descriptor: FetchDescriptor<E>) -> Self {
        self.descriptor = descriptor;
        self
    }

    /// Keep only rows passing `filter`.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.descriptor = self.descriptor.with_filter(filter);
        self
    }

    /// Append a sort criterion.
    pub fn sort(mut self, sort: SortDescriptor<E>) -> Self {
        self.descriptor = self.descriptor.sorted_by(sort);
        self
    }

    /// Append a sort criterion on a key extracted from each row.
    pub fn sort_by_key<K, F>(self, key: F, order: SortOrder) -> Self
    where
        K: Ord,
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        self.sort(SortDescriptor::by_key(key, order))
    }

    /// Return at most `limit` rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.descriptor = self.descriptor.with_limit(limit);
        self
    }

    /// Skip the first `offset` rows.
    pub fn offset(mut self, offset: usize) -> Self {
        self.descriptor = self.descriptor.with_offset(offset);
        self
    }

    /// Bind a context up front.
    pub fn context(mut self, context: Arc<dyn PersistenceContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// Run invalidations inside `transaction`. Excludes [`animation`](Self::animation).
    pub fn transaction(mut self, transaction: Transaction) -> Self {
        self.transaction = Some(transaction);
        self
    }

    /// Run invalidations inside `animation`. Excludes [`transaction`](Self::transaction).
    pub fn animation(mut self, animation: Animation) -> Self {
        self.animation = Some(animation);
        self
    }

    /// Open envelope scopes through `presenter` instead of the installed one.
    pub fn presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    /// Listen on `changes` instead of the process-wide bus.
    pub fn changes(mut self, changes: Arc<Notifier<ContextChange>>) -> Self {
        self.changes = Some(changes);
        self
    }

    /// Build the bridge.
    ///
    /// Fails with [`BridgeError::ConflictingEnvelope`] if both a transaction
    /// and an animation were configured.
    pub fn build(self) -> Result<QueryBridge<E>> {
        let envelope = MutationEnvelope::from_parts(self.transaction, self.animation)
            .ok_or(BridgeError::ConflictingEnvelope)?;
        let changes = self.changes.unwrap_or_else(change_bus);

        Ok(QueryBridge::assemble(
            self.descriptor,
            self.context,
            envelope,
            self.presenter,
            &changes,
        ))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
