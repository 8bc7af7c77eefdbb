//! Change events posted by the persistence layer.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Weak};

use smallvec::SmallVec;

use super::context::PersistenceContext;
use super::entity::EntityType;

/// How a row changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
}

/// One `(kind, entity type)` pair of a save.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityChange {
    pub kind: ChangeKind,
    pub entity: EntityType,
}

impl EntityChange {
    pub fn new(kind: ChangeKind, entity: impl Into<EntityType>) -> Self {
        Self {
            kind,
            entity: entity.into(),
        }
    }
}

/// Weak handle to the context that posted a save.
///
/// Two origins are equal when they point at the same context.
#[derive(Clone)]
pub struct ContextOrigin(Weak<dyn PersistenceContext>);

impl ContextOrigin {
    /// Name `context` as the origin of a save.
    pub fn new(context: Weak<dyn PersistenceContext>) -> Self {
        Self(context)
    }

    /// The context, if it is still alive.
    pub fn upgrade(&self) -> Option<Arc<dyn PersistenceContext>> {
        self.0.upgrade()
    }
}

impl PartialEq for ContextOrigin {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ContextOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextOrigin")
            .field("alive", &(self.0.strong_count() > 0))
            .finish()
    }
}

/// Notification that persisted data may have changed.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextChange {
    /// A context committed a save. `origin` is the posting context, when
    /// it can be shared.
    Saved {
        changes: SmallVec<[EntityChange; 4]>,
        origin: Option<ContextOrigin>,
    },

    /// The host announced that rows of one entity type changed.
    Entity(EntityType),

    /// Another process changed these entity types.
    Remote { entities: BTreeSet<EntityType> },

    /// Persistent stores were added or removed; everything may be stale.
    StoresReset,
}

impl ContextChange {
    /// Build a `Saved` event, dropping duplicate pairs.
    pub fn saved<I>(changes: I) -> Self
    where
        I: IntoIterator<Item = EntityChange>,
    {
        let mut unique: SmallVec<[EntityChange; 4]> = SmallVec::new();
        for change in changes {
            if !unique.contains(&change) {
                unique.push(change);
            }
        }
        Self::Saved {
            changes: unique,
            origin: None,
        }
    }

    /// Attach the posting context to a `Saved` event. Other events are
    /// returned unchanged.
    pub fn with_origin(self, origin: ContextOrigin) -> Self {
        match self {
            Self::Saved { changes, .. } => Self::Saved {
                changes,
                origin: Some(origin),
            },
            other => other,
        }
    }

    /// The context that posted this event, if known and still alive.
    pub fn origin(&self) -> Option<Arc<dyn PersistenceContext>> {
        match self {
            Self::Saved {
                origin: Some(origin),
                ..
            } => origin.upgrade(),
            _ => None,
        }
    }

    /// Check if this event can affect rows of `entity`.
    ///
    /// Inserts, updates and deletes count the same.
    pub fn affects(&self, entity: &EntityType) -> bool {
        match self {
            Self::Saved { changes, .. } => changes.iter().any(|change| &change.entity == entity),
            Self::Entity(changed) => changed == entity,
            Self::Remote { entities } => entities.contains(entity),
            Self::StoresReset => true,
        }
    }

    /// Check if nothing is reported as changed.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Saved { changes, .. } => changes.is_empty(),
            Self::Remote { entities } => entities.is_empty(),
            Self::Entity(_) | Self::StoresReset => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_matches_any_kind() {
        let recipe = EntityType::from("Recipe");
        for kind in [ChangeKind::Inserted, ChangeKind::Updated, ChangeKind::Deleted] {
            let change = ContextChange::saved([EntityChange::new(kind, "Recipe")]);
            assert!(change.affects(&recipe));
        }
    }

    #[test]
    fn saved_matches_among_several_types() {
        let change = ContextChange::saved([
            EntityChange::new(ChangeKind::Inserted, "Tag"),
            EntityChange::new(ChangeKind::Deleted, "Recipe"),
        ]);
        assert!(change.affects(&EntityType::from("Recipe")));
        assert!(change.affects(&EntityType::from("Tag")));
        assert!(!change.affects(&EntityType::from("Ingredient")));
    }

    #[test]
    fn saved_drops_duplicates() {
        let change = ContextChange::saved([
            EntityChange::new(ChangeKind::Updated, "Recipe"),
            EntityChange::new(ChangeKind::Updated, "Recipe"),
            EntityChange::new(ChangeKind::Deleted, "Recipe"),
        ]);
        let ContextChange::Saved { changes, .. } = change else {
            panic!("expected a save");
        };
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn origin_is_attached_to_saves_only() {
        struct Empty;

        impl PersistenceContext for Empty {
            fn fetch_records(
                &self,
                _entity: &EntityType,
            ) -> crate::Result<Vec<crate::query::Record>> {
                Ok(Vec::new())
            }
        }

        let context: Arc<dyn PersistenceContext> = Arc::new(Empty);
        let origin = ContextOrigin::new(Arc::downgrade(&context));

        let saved = ContextChange::saved([EntityChange::new(ChangeKind::Inserted, "Recipe")])
            .with_origin(origin.clone());
        assert!(saved
            .origin()
            .is_some_and(|posted| Arc::ptr_eq(&posted, &context)));

        let reset = ContextChange::StoresReset.with_origin(origin);
        assert!(reset.origin().is_none());

        drop(context);
        assert!(saved.origin().is_none());
    }

    #[test]
    fn targeted_remote_and_reset() {
        let recipe = EntityType::from("Recipe");
        assert!(ContextChange::Entity(recipe.clone()).affects(&recipe));
        assert!(!ContextChange::Entity(EntityType::from("Tag")).affects(&recipe));

        let remote = ContextChange::Remote {
            entities: [EntityType::from("Tag")].into_iter().collect(),
        };
        assert!(!remote.affects(&recipe));

        assert!(ContextChange::StoresReset.affects(&recipe));
        assert!(!ContextChange::StoresReset.is_empty());
    }
}
