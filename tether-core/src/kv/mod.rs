//! Key-Value Bridging
//!
//! Bridges a property to one key of an external key-value store.
//!
//! # Pieces
//!
//! - [`KeyValueStore`]: the store capability (read, write-or-clear, and a
//!   change bus carrying the written key). [`MemoryStore`] implements it
//!   in process. [`default_store`] is the process-wide store bridges use
//!   when none is passed.
//! - [`Storable`]: how a bridged type maps onto a [`StoreValue`]. Native
//!   types are stored as they are; serde types opted in with
//!   [`structured_storable!`](crate::structured_storable) are stored as
//!   sorted-key JSON bytes.
//! - [`KeyValueBridge`]: the cache, the key subscription, and the owner
//!   callbacks put together.

mod bridge;
mod storable;
mod store;

pub use bridge::KeyValueBridge;
pub use storable::{decode_structured, encode_structured, Storable};
pub use store::{
    default_store, reset_default_store, set_default_store, KeyChange, KeyValueStore, MemoryStore,
    StoreValue, STANDARD_SUITE,
};
