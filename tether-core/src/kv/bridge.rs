//! KeyValueBridge Implementation
//!
//! A `KeyValueBridge<T>` backs one property with one key of a key-value
//! store.
//!
//! # How It Works
//!
//! 1. On construction the bridge subscribes to writes of its key.
//!
//! 2. `get` returns the cached value, or reads and decodes the stored one
//!    (falling back to the default) and caches that.
//!
//! 3. `set` writes straight through to the store. It does not touch the
//!    cache: the store's own change notification invalidates it, so a
//!    local write travels the same path as a write from anywhere else.
//!
//! 4. When the key changes, the bridge clears its cache inside its
//!    envelope and the owner's mutation hook.
//!
//! Dropping the bridge drops its subscription.

use std::fmt::Debug;
use std::sync::{Arc, Weak};

use super::storable::Storable;
use super::store::{default_store, KeyValueStore};
use crate::cache::{MutationEnvelope, Presenter, ValueCache};
use crate::notify::Subscription;
use crate::observe::{MutationRelay, ObservationBinding, ObservationHook, PropertyId};

struct KeyValueInner<T> {
    store: Arc<dyn KeyValueStore>,
    key: String,
    default: T,
    cache: ValueCache<T>,
    relay: MutationRelay,
}

impl<T> KeyValueInner<T>
where
    T: Storable + Clone + Send + Sync + 'static,
{
    fn fetch(&self) -> T {
        let Some(stored) = self.store.value(&self.key) else {
            return self.default.clone();
        };

        match T::decode(stored) {
            Ok(value) => value,
            Err(err) => {
                let err = err.with_key(&self.key);
                tracing::debug!(key = %self.key, error = %err, "falling back to default value");
                self.default.clone()
            }
        }
    }

    fn key_changed(&self) {
        tracing::debug!(key = %self.key, "store key changed; invalidating");
        self.relay.mutate(&mut || self.cache.invalidate());
    }
}

/// A property bridged to one key of a key-value store.
pub struct KeyValueBridge<T>
where
    T: Storable + Clone + Send + Sync + 'static,
{
    inner: Arc<KeyValueInner<T>>,
    _subscription: Subscription,
}

impl<T> KeyValueBridge<T>
where
    T: Storable + Clone + Send + Sync + 'static,
{
    /// Bridge `key` of `store`, reading `default` while the key is unset
    /// or undecodable.
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>, default: T) -> Self {
        Self::with_envelope(store, key, default, MutationEnvelope::Direct, None)
    }

    /// Bridge `key` of the process-wide [`default_store`].
    pub fn standard(key: impl Into<String>, default: T) -> Self {
        Self::new(default_store(), key, default)
    }

    /// Like [`new`](Self::new), running invalidations inside `envelope`.
    pub fn with_envelope(
        store: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        default: T,
        envelope: MutationEnvelope,
        presenter: Option<Arc<dyn Presenter>>,
    ) -> Self {
        let key = key.into();
        let inner = Arc::new(KeyValueInner {
            store: Arc::clone(&store),
            key: key.clone(),
            default,
            cache: ValueCache::new(),
            relay: MutationRelay::new(envelope, presenter),
        });

        let weak: Weak<KeyValueInner<T>> = Arc::downgrade(&inner);
        let subscription = store.observe_key(
            &key,
            Box::new(move |_| {
                if let Some(inner) = weak.upgrade() {
                    inner.key_changed();
                }
            }),
        );

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

    /// Current value.
    pub fn get(&self) -> T {
        self.inner.relay.will_access();
        self.inner.cache.read(|| self.inner.fetch())
    }

    /// Write through to the store. `None` clears the entry.
    pub fn set(&self, value: Option<T>) {
        let encoded = match value {
            Some(value) => match value.encode() {
                Ok(encoded) => encoded,
                Err(err) => {
                    tracing::warn!(key = %self.inner.key, error = %err, "not writing unencodable value");
                    return;
                }
            },
            None => None,
        };

        self.inner.store.set_value(&self.inner.key, encoded);
    }

    /// The store key.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// The value read while the key is unset.
    pub fn default_value(&self) -> &T {
        &self.inner.default
    }

    /// Check if a value is cached.
    pub fn is_cached(&self) -> bool {
        self.inner.cache.is_populated()
    }

    /// The envelope invalidations run in.
    pub fn envelope(&self) -> &MutationEnvelope {
        self.inner.relay.envelope()
    }
}

impl<T> Debug for KeyValueBridge<T>
where
    T: Storable + Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueBridge")
            .field("key", &self.inner.key)
            .field("default", &self.inner.default)
            .field("cached", &self.inner.cache.peek())
            .field("binding", &self.inner.relay.binding())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
