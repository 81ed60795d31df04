//! Per-conversation mutual exclusion.
//!
//! The engine reads a snapshot, transforms it across several catch-up steps
//! and writes it back. Two concurrent calls on the same conversation would
//! lose updates, so hosts must serialize calls per [`ConversationId`].
//! [`ConversationLocks`] does that while letting different conversations run
//! in parallel.

#![allow(clippy::disallowed_types, reason = "Blocking per-id locks, no async")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use crate::conversation::ConversationId;

type LockTable = Mutex<HashMap<ConversationId, Arc<Mutex<()>>>>;

/// One lock per conversation id, created on first use and dropped once no
/// caller holds or waits on it.
///
/// Locks guard no data, so a poisoned lock is recovered rather than
/// propagated: the storage snapshot, not the lock, is the source of truth.
#[derive(Debug, Clone, Default)]
pub struct ConversationLocks {
    locks: Arc<LockTable>,
}

impl ConversationLocks {
    /// Empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `id`.
    pub fn run<R>(&self, id: ConversationId, f: impl FnOnce() -> R) -> R {
        let entry = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Entry { table: &self.locks, id, lock: Arc::clone(locks.entry(id).or_default()) }
        };

        let _guard = entry.lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Number of conversations with a caller inside or waiting.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True if no conversation is locked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A caller's handle on one table entry. Dropping the last handle removes the
/// entry, also when the closure unwinds.
struct Entry<'a> {
    table: &'a LockTable,
    id: ConversationId,
    lock: Arc<Mutex<()>>,
}

impl Drop for Entry<'_> {
    fn drop(&mut self) {
        let mut locks = self.table.lock().unwrap_or_else(PoisonError::into_inner);

        // Handles are only cloned under the table lock, so the count is stable here.
        // One reference is the table's, one is ours.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.id);
        }
    }
}
