//! Error types for the bridge runtime.
//!
//! Almost every error in this crate is recovered where it happens: a value
//! that fails to decode falls back to the bridge's default, a query that
//! fails to run reads as an empty collection. The variants exist so those
//! recoveries can be logged with a precise reason, and so the few
//! construction-time contract violations have something to return.

use thiserror::Error;

/// Errors produced while reading, writing, or configuring a bridge.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BridgeError {
    /// A stored value could not be turned back into the bridged type.
    #[error("failed to decode value for key `{key}`: {reason}")]
    Decode { key: String, reason: String },

    /// A structured value could not be serialized for storage.
    #[error("failed to encode value: {reason}")]
    Encode { reason: String },

    /// The store held a native value of a different kind than requested.
    #[error("expected a stored {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// The persistence context failed to run a fetch.
    #[error("query for `{entity}` failed: {reason}")]
    QueryExecution { entity: String, reason: String },

    /// No context was bound to the bridge and no default was configured.
    #[error("no persistence context available for `{entity}`")]
    MissingContext { entity: String },

    /// A query bridge was configured with both a transaction and an animation.
    #[error("a query bridge accepts a transaction or an animation, not both")]
    ConflictingEnvelope,

    /// Reading the persistent change history failed.
    #[error("failed to read change history: {reason}")]
    History { reason: String },
}

impl BridgeError {
    /// Attach the store key to a decode failure raised without one.
    pub(crate) fn with_key(self, key: &str) -> Self {
        match self {
            BridgeError::Decode { reason, .. } => BridgeError::Decode {
                key: key.to_string(),
                reason,
            },
            other => other,
        }
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, BridgeError>;
