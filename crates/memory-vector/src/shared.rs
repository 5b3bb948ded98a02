//! Shared store with a single-writer discipline.
//!
//! Readers take a cheap `Arc` snapshot and search it without holding any
//! lock, so they never see a half-built store. Writers serialize on an
//! async mutex; mutations copy-on-write the current snapshot and publish
//! the result with one pointer swap.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::VectorError;
use crate::store::VectorMemoryStore;

/// The live memory store, shared by sync, retrieval and personal inserts.
#[derive(Debug)]
pub struct SharedStore {
    current: RwLock<Arc<VectorMemoryStore>>,
    writer: Mutex<()>,
}

impl SharedStore {
    pub fn new(store: VectorMemoryStore) -> Self {
        Self {
            current: RwLock::new(Arc::new(store)),
            writer: Mutex::new(()),
        }
    }

    /// The currently published store.
    pub fn snapshot(&self) -> Arc<VectorMemoryStore> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Become the single writer. Held for the whole of a sync pass or insert.
    pub async fn write(&self) -> StoreWriter<'_> {
        StoreWriter {
            shared: self,
            _guard: self.writer.lock().await,
        }
    }

    fn publish(&self, store: Arc<VectorMemoryStore>) {
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = store;
    }
}

/// Exclusive write access to a [`SharedStore`].
pub struct StoreWriter<'a> {
    shared: &'a SharedStore,
    _guard: MutexGuard<'a, ()>,
}

impl StoreWriter<'_> {
    /// The store as last published. No other writer can change it while
    /// this guard is held.
    pub fn current(&self) -> Arc<VectorMemoryStore> {
        self.shared.snapshot()
    }

    /// Publish a fully built replacement store.
    pub fn replace(&self, store: VectorMemoryStore) -> Arc<VectorMemoryStore> {
        let store = Arc::new(store);
        debug!(records = store.size(), "Publishing memory store");
        self.shared.publish(store.clone());
        store
    }

    /// Apply `f` to a copy of the current store and publish the result if
    /// `f` succeeds. On error nothing is published.
    pub fn update<F, T>(&self, f: F) -> Result<(T, Arc<VectorMemoryStore>), VectorError>
    where
        F: FnOnce(&mut VectorMemoryStore) -> Result<T, VectorError>,
    {
        let mut next = (*self.current()).clone();
        let out = f(&mut next)?;
        Ok((out, self.replace(next)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_types::Origin;

    #[tokio::test]
    async fn test_update_publishes() {
        let shared = SharedStore::new(VectorMemoryStore::new(2));
        let before = shared.snapshot();

        let writer = shared.write().await;
        let (position, after) = writer
            .update(|store| store.add("fact", &[1.0, 0.0], Origin::Personal))
            .unwrap();
        drop(writer);

        assert_eq!(position, 0);
        assert_eq!(after.size(), 1);
        assert_eq!(shared.snapshot().size(), 1);
        // Earlier snapshots are unaffected
        assert_eq!(before.size(), 0);
    }

    #[tokio::test]
    async fn test_failed_update_publishes_nothing() {
        let shared = SharedStore::new(VectorMemoryStore::new(2));
        let writer = shared.write().await;
        let result = writer.update(|store| store.add("bad", &[1.0], Origin::Personal));
        assert!(result.is_err());
        drop(writer);
        assert_eq!(shared.snapshot().size(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_lose_nothing() {
        let shared = Arc::new(SharedStore::new(VectorMemoryStore::new(2)));

        let mut handles = Vec::new();
        for i in 0..32 {
            let shared = shared.clone();
            handles.push(tokio::spawn(async move {
                let writer = shared.write().await;
                tokio::task::yield_now().await;
                writer
                    .update(|store| store.add(format!("fact {}", i), &[1.0, 0.0], Origin::Personal))
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(shared.snapshot().size(), 32);
    }
}
