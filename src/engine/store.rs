use crate::core::{AggregateState, StoreError};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Keyed storage contract required by the aggregation engine.
///
/// Implementations must make each individual operation atomic. They are not
/// required to make a get/put pair atomic: read-modify-write safety comes
/// from the shard layer, which gives every station exactly one writer.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, station: &str) -> Result<Option<AggregateState>, StoreError>;

    async fn put(&self, station: &str, state: &AggregateState) -> Result<(), StoreError>;

    /// Point-in-time view of every aggregate, for checkpointing.
    async fn snapshot(&self) -> Result<BTreeMap<String, AggregateState>, StoreError>;

    /// Replace the store contents with a previously taken snapshot.
    async fn restore(&self, entries: BTreeMap<String, AggregateState>) -> Result<(), StoreError>;
}
