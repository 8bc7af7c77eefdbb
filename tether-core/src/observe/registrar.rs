//! Registrar Implementation
//!
//! A `Registrar` is a ready-made [`ObservationHook`] for owners that do
//! not bring their own observation system. It counts reads and mutations
//! per property and supports one-shot change tracking:
//!
//! ```rust,ignore
//! let value = registrar.observe(
//!     || settings.username(),          // reads are recorded
//!     move || println!("username changed"),
//! );
//! ```
//!
//! The `on_change` callback fires once, on the first mutation of any
//! property read inside `apply`, after that mutation's invalidation ran.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::context::TrackingScope;
use super::hook::{ObservationHook, PropertyId};

/// Unique identifier for a registrar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RegistrarId(u64);

impl RegistrarId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

struct PendingObserver {
    properties: HashSet<PropertyId>,
    on_change: Box<dyn FnOnce() + Send>,
}

#[derive(Default)]
struct RegistrarState {
    accesses: HashMap<PropertyId, usize>,
    mutations: HashMap<PropertyId, usize>,
    observers: Vec<PendingObserver>,
}

/// Per-owner observation bookkeeping.
pub struct Registrar {
    id: RegistrarId,
    state: Mutex<RegistrarState>,
}

impl Registrar {
    pub fn new() -> Self {
        Self {
            id: RegistrarId::new(),
            state: Mutex::new(RegistrarState::default()),
        }
    }

    /// Run `apply`, then call `on_change` once when any property it read
    /// from this registrar is next mutated.
    ///
    /// If `apply` reads nothing, `on_change` is dropped without being called.
    pub fn observe<R, A, C>(&self, apply: A, on_change: C) -> R
    where
        A: FnOnce() -> R,
        C: FnOnce() + Send + 'static,
    {
        let scope = TrackingScope::enter(self.id);
        let result = apply();
        let properties = scope.finish();

        if !properties.is_empty() {
            self.state.lock().observers.push(PendingObserver {
                properties,
                on_change: Box::new(on_change),
            });
        }

        result
    }

    /// How many times `property` was read.
    pub fn access_count(&self, property: &PropertyId) -> usize {
        self.state.lock().accesses.get(property).copied().unwrap_or(0)
    }

    /// How many times `property` was reported as changed.
    pub fn mutation_count(&self, property: &PropertyId) -> usize {
        self.state.lock().mutations.get(property).copied().unwrap_or(0)
    }

    /// Number of observers still waiting for a change.
    pub fn pending_observers(&self) -> usize {
        self.state.lock().observers.len()
    }
}

impl Default for Registrar {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservationHook for Registrar {
    fn will_access(&self, property: &PropertyId) {
        *self
            .state
            .lock()
            .accesses
            .entry(property.clone())
            .or_insert(0) += 1;
        TrackingScope::record(self.id, property);
    }

    fn did_mutate(&self, property: &PropertyId, invalidate: &mut dyn FnMut()) {
        invalidate();

        let fired: Vec<PendingObserver> = {
            let mut state = self.state.lock();
            *state.mutations.entry(property.clone()).or_insert(0) += 1;

            let (fired, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut state.observers)
                .into_iter()
                .partition(|observer| observer.properties.contains(property));
            state.observers = waiting;
            fired
        };

        tracing::trace!(property = %property, observers = fired.len(), "property changed");
        for observer in fired {
            (observer.on_change)();
        }
    }
}

impl std::fmt::Debug for Registrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registrar")
            .field("id", &self.id)
            .field("pending_observers", &self.pending_observers())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
