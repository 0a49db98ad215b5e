//! Per-document serialization of workflow mutations.
//!
//! Two transitions on the same document must not interleave their
//! read-check-write sequences. Each mutating engine call holds the document's
//! lock until its commit finishes. Different documents never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Held for the duration of one mutating operation on a document.
pub struct DocumentGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Registry of async mutexes keyed by document id.
#[derive(Default)]
pub struct DocumentLocks {
    locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `document_id`.
    pub async fn acquire(&self, document_id: i64) -> DocumentGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries nobody holds or waits on can go.
            locks.retain(|id, l| *id == document_id || Arc::strong_count(l) > 1);
            Arc::clone(locks.entry(document_id).or_default())
        };
        DocumentGuard {
            _guard: lock.lock_owned().await,
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
