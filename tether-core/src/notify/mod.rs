//! Change Notification
//!
//! The external layer announces "something changed" through a
//! [`Notifier`]. Events carry just enough identity to test relevance: the
//! changed key for a key-value store, the changed entity types for a
//! persistence context. Bridges subscribe once at construction and filter
//! every event against their own subject by plain equality or set
//! membership.
//!
//! A subscription is an owned [`Subscription`] handle. Dropping it
//! detaches the listener, which is how a bridge deregisters when it is
//! destroyed.

mod notifier;
mod subscriber;

pub use notifier::{Listener, Notifier, Subscription};
pub use subscriber::SubscriberId;
