//! In-memory registry of transactions awaiting an external signature.

use super::clock::Clock;
use crate::chain::types::UnsignedTransaction;
use serde::{Deserialize, Serialize};
use std::{
    collections::{hash_map::Entry, HashMap},
    fmt::{self, Display, Formatter},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use uuid::Uuid;

/// Identifier handed out for a pending transaction.
///
/// It only has to be unique among pending entries, it is not a credential.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

impl From<String> for TransactionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A transaction deferred for external signing.
struct PendingEntry {
    transaction: UnsignedTransaction,
    created_at_ms: u64,
}

/// Read-only view of a pending entry.
#[derive(Debug)]
pub struct Peek {
    pub transaction: UnsignedTransaction,
    pub age_ms: u64,
}

/// Registry of unsigned transactions keyed by a generated identifier.
///
/// All mutations go through one lock, so `take` and `evict_older_than` can
/// never both claim the same entry.
pub struct PendingStore {
    entries: Mutex<HashMap<TransactionId, PendingEntry>>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl PendingStore {
    /// Creates an empty store ageing its entries with the specified clock.
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            entries: Default::default(),
            clock,
        }
    }

    /// Records a transaction and returns its fresh identifier.
    pub fn put(&self, transaction: UnsignedTransaction) -> TransactionId {
        let created_at_ms = self.clock.now_ms();
        let mut entries = self.entries();
        loop {
            let id = TransactionId::generate();
            if let Entry::Vacant(slot) = entries.entry(id.clone()) {
                slot.insert(PendingEntry {
                    transaction,
                    created_at_ms,
                });
                return id;
            }
        }
    }

    /// Removes and returns the transaction, at most once per identifier.
    pub fn take(&self, id: &TransactionId) -> Option<UnsignedTransaction> {
        self.entries().remove(id).map(|entry| entry.transaction)
    }

    /// Returns the transaction and its age without removing it.
    pub fn peek(&self, id: &TransactionId) -> Option<Peek> {
        let now = self.clock.now_ms();
        self.entries().get(id).map(|entry| Peek {
            transaction: entry.transaction.clone(),
            age_ms: now.saturating_sub(entry.created_at_ms),
        })
    }

    /// Removes every entry older than `max_age`, returning how many were
    /// removed.
    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        let now = self.clock.now_ms();
        let max_age_ms = u64::try_from(max_age.as_millis()).unwrap_or(u64::MAX);

        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|id, entry| {
            let keep = now.saturating_sub(entry.created_at_ms) <= max_age_ms;
            if !keep {
                tracing::debug!(transaction_id = %id, "evicting expired transaction");
            }
            keep
        });
        before - entries.len()
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Every operation leaves the map consistent, so a panic while holding
    /// the lock does not invalidate it.
    fn entries(&self) -> MutexGuard<'_, HashMap<TransactionId, PendingEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
