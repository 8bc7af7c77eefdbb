//! Remote change tracking.
//!
//! When another process writes to the shared store, no local save event is
//! posted. A [`HistoryTracker`] asks a [`HistorySource`] for the
//! transactions recorded since it last looked, turns the entity types they
//! touched into one [`ContextChange::Remote`] event, and persists where it
//! stopped so the next call (or the next launch) resumes from there.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use super::change::{ContextChange, EntityChange};
use super::context::change_bus;
use super::entity::EntityType;
use crate::error::{BridgeError, Result};
use crate::kv::{KeyValueStore, Storable};
use crate::notify::Notifier;

/// Store key the last token is persisted under unless configured otherwise.
pub const DEFAULT_TOKEN_KEY: &str = "tether.history.last-token";

/// How far back to look when no token has been persisted yet.
pub const REMOTE_LOOKBACK: Duration = Duration::from_secs(1);

/// Opaque position in a history of transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryToken(pub Vec<u8>);

crate::structured_storable!(HistoryToken);

/// Where to start reading history.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryCursor {
    /// Transactions strictly after this token.
    After(HistoryToken),
    /// Transactions recorded at or after this instant.
    Since(SystemTime),
}

/// One recorded transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryTransaction {
    pub token: HistoryToken,
    pub changes: Vec<EntityChange>,
}

/// Source of persisted transaction history.
pub trait HistorySource: Send + Sync {
    /// Transactions from `cursor` on, oldest first.
    fn transactions(&self, cursor: &HistoryCursor) -> Result<Vec<HistoryTransaction>>;
}

/// Turns persisted history into [`ContextChange::Remote`] events.
pub struct HistoryTracker {
    source: Arc<dyn HistorySource>,
    store: Arc<dyn KeyValueStore>,
    token_key: String,
    changes: Arc<Notifier<ContextChange>>,
}

impl HistoryTracker {
    /// A tracker reading `source`, persisting its token in `store` under
    /// [`DEFAULT_TOKEN_KEY`] and posting to the process-wide bus.
    pub fn new(source: Arc<dyn HistorySource>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            source,
            store,
            token_key: DEFAULT_TOKEN_KEY.to_string(),
            changes: change_bus(),
        }
    }

    /// Persist the token under `key`.
    pub fn with_token_key(mut self, key: impl Into<String>) -> Self {
        self.token_key = key.into();
        self
    }

    /// Post events to `changes` instead of the process-wide bus.
    pub fn with_changes(mut self, changes: Arc<Notifier<ContextChange>>) -> Self {
        self.changes = changes;
        self
    }

    /// The store key the token is persisted under.
    pub fn token_key(&self) -> &str {
        &self.token_key
    }

    /// The persisted token, if any. An undecodable token counts as none.
    pub fn last_token(&self) -> Option<HistoryToken> {
        let stored = self.store.value(&self.token_key)?;
        match HistoryToken::decode(stored) {
            Ok(token) => Some(token),
            Err(err) => {
                let err = err.with_key(&self.token_key);
                tracing::warn!(error = %err, "ignoring unreadable history token");
                None
            }
        }
    }

    /// Read new history and post the entity types it touched.
    ///
    /// Returns the set that was posted (empty if nothing changed). A failing
    /// source is logged and reported; the persisted token is left alone.
    pub fn remote_change(&self) -> Result<BTreeSet<EntityType>> {
        let cursor = match self.last_token() {
            Some(token) => HistoryCursor::After(token),
            None => HistoryCursor::Since(
                SystemTime::now()
                    .checked_sub(REMOTE_LOOKBACK)
                    .unwrap_or(SystemTime::UNIX_EPOCH),
            ),
        };

        let transactions = self.source.transactions(&cursor).map_err(|err| {
            tracing::error!(error = %err, "failed to read persistent history");
            BridgeError::History {
                reason: err.to_string(),
            }
        })?;

        let entities: BTreeSet<EntityType> = transactions
            .iter()
            .flat_map(|transaction| transaction.changes.iter())
            .map(|change| change.entity.clone())
            .collect();

        if let Some(newest) = transactions.last() {
            self.save_token(&newest.token);
        }

        if !entities.is_empty() {
            tracing::debug!(
                transactions = transactions.len(),
                entities = entities.len(),
                "posting remote change"
            );
            self.changes.emit(&ContextChange::Remote {
                entities: entities.clone(),
            });
        }
        Ok(entities)
    }

    fn save_token(&self, token: &HistoryToken) {
        match token.encode() {
            Ok(value) => self.store.set_value(&self.token_key, value),
            Err(err) => tracing::warn!(error = %err, "failed to persist history token"),
        }
    }
}

impl fmt::Debug for HistoryTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryTracker")
            .field("token_key", &self.token_key)
            .finish_non_exhaustive()
    }
}
