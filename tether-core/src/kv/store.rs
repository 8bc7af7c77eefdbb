//! Key-value store capability.
//!
//! The store itself lives outside this crate; bridges only need to read a
//! value, write (or clear) a value, and hear about writes to one key.
//! [`MemoryStore`] is an in-process implementation for hosts without a
//! platform store, and for tests.

use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use parking_lot::RwLock;
use url::Url;

use crate::notify::{Notifier, Subscription};

/// A value as the store holds it natively.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    Int(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    String(String),
    Url(Url),
    Data(Vec<u8>),
    StringList(Vec<String>),
}

impl StoreValue {
    /// Name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreValue::Int(_) => "int",
            StoreValue::Float(_) => "float",
            StoreValue::Double(_) => "double",
            StoreValue::Bool(_) => "bool",
            StoreValue::String(_) => "string",
            StoreValue::Url(_) => "url",
            StoreValue::Data(_) => "data",
            StoreValue::StringList(_) => "string list",
        }
    }
}

/// Notification that one key was written or cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChange {
    pub key: String,
}

/// What a bridge needs from a key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    fn value(&self, key: &str) -> Option<StoreValue>;

    /// Write `value` under `key`, or clear the entry when `value` is `None`.
    ///
    /// Implementations must notify [`changes`](Self::changes) after every
    /// call, with no internal lock held.
    fn set_value(&self, key: &str, value: Option<StoreValue>);

    /// The bus write notifications are posted to.
    fn changes(&self) -> &Arc<Notifier<KeyChange>>;

    /// Subscribe to writes of exactly `key`.
    fn observe_key(
        &self,
        key: &str,
        on_change: Box<dyn Fn(&KeyChange) + Send + Sync>,
    ) -> Subscription {
        let key = key.to_string();
        self.changes().subscribe(move |change: &KeyChange| {
            if change.key == key {
                on_change(change);
            }
        })
    }
}

/// In-process key-value store.
pub struct MemoryStore {
    suite: Option<String>,
    values: DashMap<String, StoreValue>,
    changes: Arc<Notifier<KeyChange>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            suite: None,
            values: DashMap::new(),
            changes: Notifier::shared(),
        }
    }

    /// A store identified by a suite name, for hosts that keep several.
    pub fn with_suite(suite: impl Into<String>) -> Self {
        Self {
            suite: Some(suite.into()),
            ..Self::new()
        }
    }

    pub fn suite(&self) -> Option<&str> {
        self.suite.as_deref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn value(&self, key: &str) -> Option<StoreValue> {
        self.values.get(key).map(|entry| entry.value().clone())
    }

    fn set_value(&self, key: &str, value: Option<StoreValue>) {
        match value {
            Some(value) => {
                self.values.insert(key.to_string(), value);
            }
            None => {
                self.values.remove(key);
            }
        }

        tracing::trace!(key = %key, suite = ?self.suite, "store value written");
        self.changes.emit(&KeyChange {
            key: key.to_string(),
        });
    }

    fn changes(&self) -> &Arc<Notifier<KeyChange>> {
        &self.changes
    }
}

/// Suite name of the store [`default_store`] starts out with.
pub const STANDARD_SUITE: &str = "standard";

static DEFAULT_STORE: OnceLock<RwLock<Arc<dyn KeyValueStore>>> = OnceLock::new();

fn standard_store() -> Arc<dyn KeyValueStore> {
    Arc::new(MemoryStore::with_suite(STANDARD_SUITE))
}

fn default_slot() -> &'static RwLock<Arc<dyn KeyValueStore>> {
    DEFAULT_STORE.get_or_init(|| RwLock::new(standard_store()))
}

/// The store [`KeyValueBridge::standard`](super::KeyValueBridge::standard)
/// bridges use. Until a host installs its own, this is an in-process
/// [`MemoryStore`] with suite [`STANDARD_SUITE`].
pub fn default_store() -> Arc<dyn KeyValueStore> {
    Arc::clone(&default_slot().read())
}

/// Install the process-wide default store. Bridges created earlier keep
/// the store they were created with.
pub fn set_default_store(store: Arc<dyn KeyValueStore>) {
    *default_slot().write() = store;
}

/// Go back to a fresh in-process standard store.
pub fn reset_default_store() {
    *default_slot().write() = standard_store();
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("suite", &self.suite)
            .field("len", &self.values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn default_store_can_be_replaced_and_reset() {
        let installed: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::with_suite("host"));
        set_default_store(installed.clone());
        assert!(Arc::ptr_eq(&default_store(), &installed));

        reset_default_store();
        assert!(!Arc::ptr_eq(&default_store(), &installed));
        assert!(Arc::ptr_eq(&default_store(), &default_store()));
    }

    #[test]
    fn set_and_clear() {
        let store = MemoryStore::new();
        assert_eq!(store.value("k"), None);

        store.set_value("k", Some(StoreValue::String("a".into())));
        assert_eq!(store.value("k"), Some(StoreValue::String("a".into())));

        store.set_value("k", None);
        assert_eq!(store.value("k"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn observe_key_only_hears_its_key() {
        let store = MemoryStore::with_suite("group");
        let heard = Arc::new(AtomicI32::new(0));
        let heard_clone = heard.clone();

        let _subscription = store.observe_key(
            "watched",
            Box::new(move |_| {
                heard_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        store.set_value("other", Some(StoreValue::Bool(true)));
        assert_eq!(heard.load(Ordering::SeqCst), 0);

        store.set_value("watched", Some(StoreValue::Int(1)));
        store.set_value("watched", None);
        assert_eq!(heard.load(Ordering::SeqCst), 2);
        assert_eq!(store.suite(), Some("group"));
    }

    #[test]
    fn listener_may_read_store_during_notification() {
        let store = Arc::new(MemoryStore::new());
        let seen = Arc::new(parking_lot::Mutex::new(None));

        let store_clone = store.clone();
        let seen_clone = seen.clone();
        let _subscription = store.observe_key(
            "k",
            Box::new(move |change| {
                *seen_clone.lock() = store_clone.value(&change.key);
            }),
        );

        store.set_value("k", Some(StoreValue::Double(1.5)));
        assert_eq!(*seen.lock(), Some(StoreValue::Double(1.5)));
    }
}
