//! Tether Core
//!
//! This crate ties properties of an observable model to external data
//! sources and keeps them current. It implements:
//!
//! - A memoizing value cache that is cleared when its source changes
//! - Key-value bridging (a property backed by one store key)
//! - Query bridging (a property backed by a live persistence query)
//! - Observation hooks so the owning model can track reads and changes
//! - Presentation envelopes (transactions and animations) for invalidations
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `notify`: Change buses and subscription handles
//! - `cache`: The value cache and mutation envelopes
//! - `observe`: Owner hooks and a ready-made registrar
//! - `kv`: Key-value stores, storable types and the key-value bridge
//! - `query`: Persistence contexts, change events and the query bridge
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tether_core::kv::{KeyValueBridge, KeyValueStore, MemoryStore, StoreValue};
//!
//! let store = Arc::new(MemoryStore::new());
//! let username = KeyValueBridge::new(store.clone(), "username", String::from("guest"));
//!
//! // First read goes to the store and falls back to the default
//! assert_eq!(username.get(), "guest");
//!
//! // A write from anywhere invalidates the cached value
//! store.set_value("username", Some(StoreValue::String("ada".into())));
//! assert_eq!(username.get(), "ada");
//! ```

pub mod cache;
pub mod error;
pub mod kv;
pub mod notify;
pub mod observe;
pub mod query;

pub use error::{BridgeError, Result};
pub use kv::KeyValueBridge;
pub use observe::{ObservationHook, PropertyId, Registrar};
pub use query::QueryBridge;
