use crate::core::{AggregateState, Result, StoreError};
use crate::engine::store::StateStore;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory state store. Aggregates never expire; a restart starts cold
/// unless a checkpoint file is restored first.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: RwLock<HashMap<String, AggregateState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist a point-in-time snapshot as JSON.
    pub async fn checkpoint_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let snapshot = self.snapshot().await?;
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        tokio::fs::write(path.as_ref(), bytes).await?;
        debug!(entries = snapshot.len(), path = %path.as_ref().display(), "checkpoint written");
        Ok(())
    }

    /// Build a store from a checkpoint previously written by
    /// [`checkpoint_to`](Self::checkpoint_to).
    pub async fn restore_from(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        let snapshot: BTreeMap<String, AggregateState> = serde_json::from_slice(&bytes)?;
        debug!(entries = snapshot.len(), path = %path.as_ref().display(), "checkpoint restored");
        let store = Self::new();
        store.restore(snapshot).await.map_err(crate::core::PipelineError::from)?;
        Ok(store)
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, station: &str) -> std::result::Result<Option<AggregateState>, StoreError> {
        Ok(self.entries.read().await.get(station).cloned())
    }

    async fn put(&self, station: &str, state: &AggregateState) -> std::result::Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(station.to_string(), state.clone());
        Ok(())
    }

    async fn snapshot(&self) -> std::result::Result<BTreeMap<String, AggregateState>, StoreError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .map(|(station, state)| (station.clone(), state.clone()))
            .collect())
    }

    async fn restore(
        &self,
        snapshot: BTreeMap<String, AggregateState>,
    ) -> std::result::Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.clear();
        entries.extend(snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(sum_temp_f: f64, sum_humidity: f64, count: i64) -> AggregateState {
        AggregateState {
            sum_temp_f,
            sum_humidity,
            count,
        }
    }

    #[tokio::test]
    async fn get_put_and_overwrite() {
        let store = MemoryStateStore::new();
        assert_eq!(store.get("A").await.unwrap(), None);

        store.put("A", &state(95.0, 60.0, 1)).await.unwrap();
        assert_eq!(store.get("A").await.unwrap(), Some(state(95.0, 60.0, 1)));

        store.put("A", &state(184.6, 100.0, 2)).await.unwrap();
        assert_eq!(store.get("A").await.unwrap(), Some(state(184.6, 100.0, 2)));
    }

    #[tokio::test]
    async fn snapshot_and_restore_round_trip() {
        let store = MemoryStateStore::new();
        store.put("A", &state(95.0, 60.0, 1)).await.unwrap();
        store.put("B", &state(104.0, 70.0, 1)).await.unwrap();

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 2);

        let other = MemoryStateStore::new();
        other.put("STALE", &state(1.0, 1.0, 1)).await.unwrap();
        other.restore(snapshot.clone()).await.unwrap();
        assert_eq!(other.get("STALE").await.unwrap(), None);
        assert_eq!(other.snapshot().await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn checkpoint_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = MemoryStateStore::new();
        store.put("A", &state(184.6, 100.0, 2)).await.unwrap();
        store.put("B", &state(104.0, 70.0, 1)).await.unwrap();
        store.checkpoint_to(&path).await.unwrap();

        let restored = MemoryStateStore::restore_from(&path).await.unwrap();
        assert_eq!(
            restored.snapshot().await.unwrap(),
            store.snapshot().await.unwrap()
        );
    }
}
