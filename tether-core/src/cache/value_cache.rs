//! ValueCache Implementation
//!
//! A `ValueCache` memoizes one expensive read (deserializing from a store,
//! running a query) until it is told the underlying data changed.
//!
//! # States
//!
//! - `Empty`: nothing cached. The next read runs the fetch.
//! - `Populated`: a value is cached and considered fresh until invalidated.
//!
//! `Empty -> Populated` only happens through a read, `Populated -> Empty`
//! only through [`ValueCache::invalidate`].
//!
//! # Invalidation during a fetch
//!
//! The fetch runs with no lock held, because fetching may itself trigger a
//! change notification that invalidates this very cache. Each invalidation
//! bumps a generation counter; a fetch only stores its result if the
//! generation is unchanged when it finishes. A value fetched across an
//! invalidation is still returned to that caller, but the next read
//! fetches again.

use std::fmt::Debug;

use parking_lot::Mutex;

/// State of a [`ValueCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Nothing cached; the next read fetches.
    Empty,

    /// A fresh value is cached.
    Populated,
}

struct Slot<T> {
    value: Option<T>,
    generation: u64,
}

/// Memoization cell holding at most one value.
pub struct ValueCache<T> {
    slot: Mutex<Slot<T>>,
}

impl<T: Clone> ValueCache<T> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                value: None,
                generation: 0,
            }),
        }
    }

    /// Return the cached value, or run `fetch` and cache its result.
    pub fn read<F>(&self, fetch: F) -> T
    where
        F: FnOnce() -> T,
    {
        match self.try_read(|| Ok::<T, std::convert::Infallible>(fetch())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Like [`read`](Self::read), for fetches that can fail.
    ///
    /// A failed fetch leaves the cache empty, so the next read retries.
    pub fn try_read<F, E>(&self, fetch: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let generation = {
            let slot = self.slot.lock();
            if let Some(value) = slot.value.as_ref() {
                tracing::trace!("value cache hit");
                return Ok(value.clone());
            }
            slot.generation
        };

        tracing::trace!("value cache miss");
        let value = fetch()?;

        let mut slot = self.slot.lock();
        if slot.generation == generation {
            slot.value = Some(value.clone());
        } else {
            tracing::trace!("value cache invalidated during fetch; not storing");
        }
        Ok(value)
    }

    /// Clear the cache. Invalidating an empty cache is a no-op apart from
    /// discarding any fetch currently in flight.
    pub fn invalidate(&self) {
        let mut slot = self.slot.lock();
        slot.value = None;
        slot.generation = slot.generation.wrapping_add(1);
    }

    /// Current state.
    pub fn state(&self) -> CacheState {
        if self.slot.lock().value.is_some() {
            CacheState::Populated
        } else {
            CacheState::Empty
        }
    }

    /// Check if a value is cached.
    pub fn is_populated(&self) -> bool {
        self.state() == CacheState::Populated
    }

    /// Clone of the cached value without fetching.
    pub fn peek(&self) -> Option<T> {
        self.slot.lock().value.clone()
    }
}

impl<T: Clone> Default for ValueCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Debug> Debug for ValueCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueCache")
            .field("value", &self.peek())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
