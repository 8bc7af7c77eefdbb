//! Persistence context capability and the process-wide defaults.
//!
//! A context hands out the stored rows of one entity type; the bridge's
//! [`FetchDescriptor`] filters, sorts and pages them. Rows travel as
//! `Arc<dyn Any>` so one context can serve bridges of any entity type and
//! be shared behind a trait object.
//!
//! # Defaults
//!
//! Hosts usually configure one context for the whole application at
//! start-up with [`set_default_context`]. Bridges without an explicitly
//! bound context read through it. The slot is written rarely and read on
//! every uncached fetch.
//!
//! [`change_bus`] is the process-wide channel contexts post their
//! [`ContextChange`] events to unless given a bus of their own.

use std::any::Any;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use super::change::ContextChange;
use super::descriptor::FetchDescriptor;
use super::entity::{Entity, EntityType};
use crate::error::{BridgeError, Result};
use crate::notify::Notifier;

/// One stored row, type-erased.
pub type Record = Arc<dyn Any + Send + Sync>;

/// What a query bridge needs from the persistence layer.
pub trait PersistenceContext: Send + Sync {
    /// All stored rows of `entity`.
    fn fetch_records(&self, entity: &EntityType) -> Result<Vec<Record>>;
}

/// Run `descriptor` against `context`.
pub fn fetch<E: Entity>(
    context: &dyn PersistenceContext,
    descriptor: &FetchDescriptor<E>,
) -> Result<Vec<E>> {
    let entity = EntityType::of::<E>();
    let records = context.fetch_records(&entity)?;

    let rows = records
        .iter()
        .map(|record| {
            (**record)
                .downcast_ref::<E>()
                .cloned()
                .ok_or_else(|| BridgeError::QueryExecution {
                    entity: entity.to_string(),
                    reason: "stored record has a different type".to_string(),
                })
        })
        .collect::<Result<Vec<E>>>()?;

    Ok(descriptor.apply(rows))
}

static DEFAULT_CONTEXT: OnceLock<RwLock<Option<Arc<dyn PersistenceContext>>>> = OnceLock::new();
static CHANGE_BUS: OnceLock<Arc<Notifier<ContextChange>>> = OnceLock::new();

fn default_slot() -> &'static RwLock<Option<Arc<dyn PersistenceContext>>> {
    DEFAULT_CONTEXT.get_or_init(|| RwLock::new(None))
}

/// Configure the context bridges fall back to.
pub fn set_default_context(context: Arc<dyn PersistenceContext>) {
    *default_slot().write() = Some(context);
}

/// Remove the default context.
pub fn clear_default_context() {
    *default_slot().write() = None;
}

/// The configured default context, if any.
pub fn default_context() -> Option<Arc<dyn PersistenceContext>> {
    default_slot().read().clone()
}

/// The process-wide change bus.
pub fn change_bus() -> Arc<Notifier<ContextChange>> {
    Arc::clone(CHANGE_BUS.get_or_init(Notifier::shared))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::descriptor::{SortDescriptor, SortOrder};

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        body: &'static str,
    }

    impl Entity for Note {
        const ENTITY_NAME: &'static str = "Note";
    }

    struct FixedContext(Vec<Record>);

    impl PersistenceContext for FixedContext {
        fn fetch_records(&self, entity: &EntityType) -> Result<Vec<Record>> {
            if entity.name() == "Note" {
                Ok(self.0.clone())
            } else {
                Ok(Vec::new())
            }
        }
    }

    #[test]
    fn fetch_downcasts_and_applies_descriptor() {
        let context = FixedContext(vec![
            Arc::new(Note { body: "b" }) as Record,
            Arc::new(Note { body: "a" }) as Record,
        ]);
        let descriptor = FetchDescriptor::new()
            .sorted_by(SortDescriptor::by_key(|n: &Note| n.body, SortOrder::Forward));

        let rows = fetch(&context, &descriptor).unwrap();
        assert_eq!(rows, vec![Note { body: "a" }, Note { body: "b" }]);
    }

    #[test]
    fn fetch_rejects_foreign_records() {
        let context = FixedContext(vec![Arc::new(42u32) as Record]);
        let result = fetch::<Note>(&context, &FetchDescriptor::new());
        assert!(matches!(result, Err(BridgeError::QueryExecution { .. })));
    }

    #[test]
    fn change_bus_is_shared() {
        assert!(Arc::ptr_eq(&change_bus(), &change_bus()));
    }
}
