//! Tracking Context
//!
//! A tracking scope records which observed properties are read while a
//! piece of code runs, so the [`Registrar`](super::Registrar) can call the
//! caller back when any of them is mutated later.
//!
//! # Implementation
//!
//! We use a thread-local stack of scopes. Entering a scope pushes an
//! entry; dropping the guard pops it. Reads are recorded into every entry
//! on the stack that belongs to the registrar being read, which keeps
//! nested scopes (an observed read inside another observed read) correct.

use std::cell::RefCell;
use std::collections::HashSet;

use super::hook::PropertyId;
use super::registrar::RegistrarId;

thread_local! {
    static SCOPE_STACK: RefCell<Vec<ScopeEntry>> = const { RefCell::new(Vec::new()) };
}

#[derive(Debug)]
struct ScopeEntry {
    registrar: RegistrarId,
    accessed: HashSet<PropertyId>,
}

/// Guard that pops the scope when dropped.
///
/// This keeps the stack balanced even if the tracked code panics.
pub(crate) struct TrackingScope {
    registrar: RegistrarId,
}

impl TrackingScope {
    /// Start recording reads of `registrar`'s properties on this thread.
    pub(crate) fn enter(registrar: RegistrarId) -> Self {
        SCOPE_STACK.with(|stack| {
            stack.borrow_mut().push(ScopeEntry {
                registrar,
                accessed: HashSet::new(),
            });
        });

        Self { registrar }
    }

    /// Record a read. No-op when no scope for `registrar` is active.
    pub(crate) fn record(registrar: RegistrarId, property: &PropertyId) {
        SCOPE_STACK.with(|stack| {
            for entry in stack.borrow_mut().iter_mut() {
                if entry.registrar == registrar {
                    entry.accessed.insert(property.clone());
                }
            }
        });
    }

    /// Check if any scope is active on this thread.
    #[cfg(test)]
    pub(crate) fn is_active() -> bool {
        SCOPE_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Close the scope and return what was read inside it.
    pub(crate) fn finish(self) -> HashSet<PropertyId> {
        SCOPE_STACK.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .map(|entry| std::mem::take(&mut entry.accessed))
                .unwrap_or_default()
        })
    }
}

impl Drop for TrackingScope {
    fn drop(&mut self) {
        SCOPE_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.registrar, self.registrar,
                    "TrackingScope mismatch: expected {:?}, got {:?}",
                    self.registrar, entry.registrar
                );
            }
        });
    }
}
