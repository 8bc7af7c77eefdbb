//! Entity identity.

use std::borrow::Cow;
use std::fmt;

/// Identity of a persisted entity type, compared by name.
///
/// Names rather than Rust type ids are used because change events may
/// originate outside this process (see [`HistoryTracker`](super::HistoryTracker)),
/// where only the entity name is known.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityType(Cow<'static, str>);

impl EntityType {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Identity of `E`.
    pub fn of<E: Entity>() -> Self {
        Self::from_static(E::ENTITY_NAME)
    }
}

impl From<&'static str> for EntityType {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A type stored in a persistence context and queried by a
/// [`QueryBridge`](super::QueryBridge).
pub trait Entity: Clone + Send + Sync + 'static {
    /// Name the persistence layer knows this type by.
    const ENTITY_NAME: &'static str;
}
