//! Per-document mutation locks.
//!
//! Mutations on the same document run one at a time; mutations on different
//! documents do not contend. Entries are dropped once nobody holds or waits
//! on them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use knowledge_core::DocumentId;

/// A table of async mutexes keyed by document.
#[derive(Default)]
pub struct DocumentLocks {
    table: Mutex<HashMap<DocumentId, Weak<AsyncMutex<()>>>>,
}

/// Held while a document is being mutated.
pub struct DocumentGuard {
    _guard: OwnedMutexGuard<()>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `document`.
    pub async fn lock(&self, document: DocumentId) -> DocumentGuard {
        let mutex = {
            // The table holds no invariants a panic could break.
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table.retain(|_, entry| entry.strong_count() > 0);

            match table.get(&document).and_then(Weak::upgrade) {
                Some(mutex) => mutex,
                None => {
                    let mutex = Arc::new(AsyncMutex::new(()));
                    table.insert(document, Arc::downgrade(&mutex));
                    mutex
                }
            }
        };

        DocumentGuard {
            _guard: mutex.lock_owned().await,
        }
    }

    /// Number of documents currently locked or awaited.
    pub fn active(&self) -> usize {
        let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.values().filter(|entry| entry.strong_count() > 0).count()
    }
}
