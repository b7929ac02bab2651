//! In-memory state store, useful for tests and ephemeral sessions.

use async_trait::async_trait;
use contextweave_core::error::StoreError;
use contextweave_core::{StateSnapshot, StateStore};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keeps the latest snapshot per session: the one with the highest turn
/// id, ties going to the most recently saved. Older turns are dropped on
/// save.
pub struct InMemoryStateStore {
    snapshots: Arc<RwLock<HashMap<String, StateSnapshot>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self {
            snapshots: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of sessions holding a snapshot.
    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.snapshots.write().await.clear();
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn latest_snapshot(
        &self,
        session_id: &str,
    ) -> Result<Option<StateSnapshot>, StoreError> {
        Ok(self.snapshots.read().await.get(session_id).cloned())
    }

    async fn save_snapshot(&self, snapshot: StateSnapshot) -> Result<(), StoreError> {
        if snapshot.session_id.is_empty() {
            return Err(StoreError::Storage("snapshot has no session id".into()));
        }
        let mut snapshots = self.snapshots.write().await;
        match snapshots.entry(snapshot.session_id.clone()) {
            Entry::Occupied(mut current) => {
                if snapshot.turn_id >= current.get().turn_id {
                    current.insert(snapshot);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(snapshot);
            }
        }
        Ok(())
    }
}
