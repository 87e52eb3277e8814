use crate::core::{AggregateState, ConvertedReading, RetryPolicy, StoreError};
use crate::engine::store::StateStore;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{trace, warn};

/// Keyed incremental aggregation over a [`StateStore`].
///
/// `update` is a read-modify-write against one station's entry. Callers must
/// hold exclusive write ownership of that station (see the shard layer);
/// under that discipline no update interleaves with another for the same key
/// and no write is lost.
pub struct AggregationEngine {
    store: Arc<dyn StateStore>,
    retry: RetryPolicy,
}

impl AggregationEngine {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Apply exactly one reading's contribution to the station's aggregate
    /// and return the post-update state. The entry is created at zero on the
    /// first reading for a station.
    ///
    /// Transient store unavailability is retried with backoff; the update is
    /// never skipped, because a dropped contribution would corrupt the
    /// running sum irrecoverably.
    pub async fn update(
        &self,
        station: &str,
        reading: &ConvertedReading,
    ) -> Result<AggregateState, StoreError> {
        let mut attempt = 0;
        loop {
            match self.apply_once(station, reading).await {
                Ok(state) => {
                    trace!(station, count = state.count, "aggregate updated");
                    return Ok(state);
                }
                Err(err @ StoreError::Unavailable(_)) if attempt + 1 < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(station, %err, ?delay, attempt, "store unavailable, retrying update");
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn apply_once(
        &self,
        station: &str,
        reading: &ConvertedReading,
    ) -> Result<AggregateState, StoreError> {
        let mut state = self.store.get(station).await?.unwrap_or_default();
        state.apply(reading);
        self.store.put(station, &state).await?;
        Ok(state)
    }
}
