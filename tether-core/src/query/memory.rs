//! In-memory persistence context.
//!
//! `MemoryContext` keeps rows per entity type in insertion order. Writes
//! apply immediately and are remembered as pending changes; [`save`]
//! posts them as one [`ContextChange::Saved`] event, the way a real
//! context announces a committed transaction. A context created with
//! [`shared`] names itself as the event's origin, so bridges with no
//! context of their own adopt it.
//!
//! [`save`]: MemoryContext::save
//! [`shared`]: MemoryContext::shared

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use super::change::{ChangeKind, ContextChange, ContextOrigin, EntityChange};
use super::context::{change_bus, PersistenceContext, Record};
use super::entity::{Entity, EntityType};
use crate::error::Result;
use crate::notify::Notifier;

/// Identifier of a row in a [`MemoryContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(u64);

/// In-process persistence context.
pub struct MemoryContext {
    tables: RwLock<HashMap<EntityType, IndexMap<RowId, Record>>>,
    pending: Mutex<Vec<EntityChange>>,
    next_row: AtomicU64,
    changes: Arc<Notifier<ContextChange>>,
    this: Weak<MemoryContext>,
}

impl MemoryContext {
    /// A context posting to the process-wide [`change_bus`].
    pub fn new() -> Self {
        Self::with_changes(change_bus())
    }

    /// A context posting to `changes`.
    pub fn with_changes(changes: Arc<Notifier<ContextChange>>) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            pending: Mutex::new(Vec::new()),
            next_row: AtomicU64::new(0),
            changes,
            this: Weak::new(),
        }
    }

    /// A shared context posting to `changes`. Its saves carry it as their
    /// origin.
    pub fn shared(changes: Arc<Notifier<ContextChange>>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            ..Self::with_changes(changes)
        })
    }

    /// The bus saves are posted to.
    pub fn changes(&self) -> &Arc<Notifier<ContextChange>> {
        &self.changes
    }

    /// Store a new row and return its id.
    pub fn insert<E: Entity>(&self, row: E) -> RowId {
        let id = RowId(self.next_row.fetch_add(1, Ordering::Relaxed));
        let entity = EntityType::of::<E>();

        self.tables
            .write()
            .entry(entity.clone())
            .or_default()
            .insert(id, Arc::new(row));
        self.record(ChangeKind::Inserted, entity);
        id
    }

    /// Replace row `id`. Returns `false` if there is no such row.
    pub fn update<E: Entity>(&self, id: RowId, row: E) -> bool {
        let entity = EntityType::of::<E>();
        let replaced = {
            let mut tables = self.tables.write();
            match tables.get_mut(&entity).and_then(|table| table.get_mut(&id)) {
                Some(slot) => {
                    *slot = Arc::new(row);
                    true
                }
                None => false,
            }
        };

        if replaced {
            self.record(ChangeKind::Updated, entity);
        }
        replaced
    }

    /// Remove row `id`. Returns `false` if there is no such row.
    pub fn delete<E: Entity>(&self, id: RowId) -> bool {
        let entity = EntityType::of::<E>();
        let removed = self
            .tables
            .write()
            .get_mut(&entity)
            .and_then(|table| table.shift_remove(&id))
            .is_some();

        if removed {
            self.record(ChangeKind::Deleted, entity);
        }
        removed
    }

    /// A copy of row `id`, if it exists.
    pub fn get<E: Entity>(&self, id: RowId) -> Option<E> {
        self.tables
            .read()
            .get(&EntityType::of::<E>())
            .and_then(|table| table.get(&id))
            .and_then(|record| (**record).downcast_ref::<E>().cloned())
    }

    /// Number of stored rows of `E`.
    pub fn count<E: Entity>(&self) -> usize {
        self.tables
            .read()
            .get(&EntityType::of::<E>())
            .map_or(0, IndexMap::len)
    }

    /// Check if there are unsaved changes.
    pub fn has_changes(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    /// Post pending changes as one save event.
    ///
    /// Returns the number of distinct `(kind, entity)` pairs posted; nothing
    /// is posted when there were no changes.
    pub fn save(&self) -> usize {
        let pending = std::mem::take(&mut *self.pending.lock());
        if pending.is_empty() {
            return 0;
        }

        let mut change = ContextChange::saved(pending);
        if self.this.strong_count() > 0 {
            let this: Weak<dyn PersistenceContext> = self.this.clone();
            change = change.with_origin(ContextOrigin::new(this));
        }
        let posted = match &change {
            ContextChange::Saved { changes, .. } => changes.len(),
            _ => 0,
        };

        tracing::debug!(changes = posted, "memory context saved");
        self.changes.emit(&change);
        posted
    }

    fn record(&self, kind: ChangeKind, entity: EntityType) {
        self.pending.lock().push(EntityChange { kind, entity });
    }
}

impl Default for MemoryContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceContext for MemoryContext {
    fn fetch_records(&self, entity: &EntityType) -> Result<Vec<Record>> {
        Ok(self
            .tables
            .read()
            .get(entity)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default())
    }
}

impl fmt::Debug for MemoryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.tables.read();
        let counts: Vec<(&str, usize)> = tables
            .iter()
            .map(|(entity, rows)| (entity.name(), rows.len()))
            .collect();
        f.debug_struct("MemoryContext")
            .field("tables", &counts)
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::context::fetch;
    use crate::query::FetchDescriptor;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        name: String,
    }

    impl Entity for Item {
        const ENTITY_NAME: &'static str = "Item";
    }

    fn item(name: &str) -> Item {
        Item { name: name.into() }
    }

    #[test]
    fn rows_keep_insertion_order() {
        let context = MemoryContext::with_changes(Notifier::shared());
        context.insert(item("first"));
        let second = context.insert(item("second"));
        context.insert(item("third"));
        context.delete::<Item>(second);

        let rows = fetch(&context, &FetchDescriptor::<Item>::new()).unwrap();
        assert_eq!(rows, vec![item("first"), item("third")]);
    }

    #[test]
    fn update_and_delete_report_missing_rows() {
        let context = MemoryContext::with_changes(Notifier::shared());
        let id = context.insert(item("a"));

        assert!(context.update(id, item("b")));
        assert_eq!(context.get::<Item>(id), Some(item("b")));

        assert!(context.delete::<Item>(id));
        assert!(!context.delete::<Item>(id));
        assert!(!context.update(id, item("c")));
        assert_eq!(context.count::<Item>(), 0);
    }

    #[test]
    fn save_posts_pending_changes_once() {
        let bus = Notifier::shared();
        let context = MemoryContext::with_changes(bus.clone());
        let events = Arc::new(Mutex::new(Vec::new()));

        let events_clone = events.clone();
        let _subscription = bus.subscribe(move |change: &ContextChange| {
            events_clone.lock().push(change.clone());
        });

        assert_eq!(context.save(), 0);
        assert!(events.lock().is_empty());

        let id = context.insert(item("a"));
        context.insert(item("b"));
        context.update(id, item("c"));
        assert!(context.has_changes());

        assert_eq!(context.save(), 2);
        assert!(!context.has_changes());

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert!(events[0].origin().is_none());
        assert_eq!(
            events[0],
            ContextChange::saved([
                EntityChange::new(ChangeKind::Inserted, "Item"),
                EntityChange::new(ChangeKind::Updated, "Item"),
            ])
        );
    }

    #[test]
    fn shared_context_names_itself_as_origin() {
        let bus = Notifier::shared();
        let context = MemoryContext::shared(bus.clone());
        let origins = Arc::new(Mutex::new(Vec::new()));

        let origins_clone = origins.clone();
        let _subscription = bus.subscribe(move |change: &ContextChange| {
            origins_clone.lock().push(change.origin());
        });

        context.insert(item("a"));
        context.save();

        let origins = origins.lock();
        let posted = origins[0].clone().expect("shared context is the origin");
        let expected: Arc<dyn PersistenceContext> = context.clone();
        assert!(Arc::ptr_eq(&posted, &expected));
    }
}
