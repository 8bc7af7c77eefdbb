//! Subscriber identities for change notifiers.
//!
//! Every listener registered with a [`Notifier`](super::Notifier) gets a
//! unique ID so it can be detached later without comparing closures.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a registered listener.
///
/// IDs are process-wide unique, so an ID handed out by one notifier never
/// accidentally detaches a listener from another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}
