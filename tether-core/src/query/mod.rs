//! Query Bridging
//!
//! Bridges a property to a live query over a persistence context.
//!
//! # Pieces
//!
//! - [`Entity`] / [`EntityType`]: what is stored, identified by name.
//! - [`FetchDescriptor`]: filter, sort criteria and paging.
//! - [`PersistenceContext`]: where rows come from. Bridges use their bound
//!   context, else the process-wide default ([`set_default_context`]).
//!   [`MemoryContext`] is an in-process implementation.
//! - [`ContextChange`]: change events, posted on a [`Notifier`] bus
//!   ([`change_bus`] unless a bridge is given its own).
//! - [`QueryBridge`]: the cache, the bus subscription, and the owner
//!   callbacks put together.
//! - [`HistoryTracker`]: turns another process's writes into
//!   [`ContextChange::Remote`] events.
//!
//! [`Notifier`]: crate::notify::Notifier

mod bridge;
mod change;
mod context;
mod descriptor;
mod entity;
mod history;
mod memory;

pub use bridge::{QueryBridge, QueryBridgeBuilder};
pub use change::{ChangeKind, ContextChange, ContextOrigin, EntityChange};
pub use context::{
    change_bus, clear_default_context, default_context, fetch, set_default_context,
    PersistenceContext, Record,
};
pub use descriptor::{FetchDescriptor, Predicate, SortDescriptor, SortOrder};
pub use entity::{Entity, EntityType};
pub use history::{
    HistoryCursor, HistorySource, HistoryToken, HistoryTracker, HistoryTransaction,
    DEFAULT_TOKEN_KEY, REMOTE_LOOKBACK,
};
pub use memory::{MemoryContext, RowId};
