use crate::core::{stage, ConvertedReading, PipelineError, Result, StationSummary};
use crate::engine::aggregate::AggregationEngine;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A summary produced by a shard, tagged with the source offset of the
/// reading that produced it so the driver can commit the cursor after
/// publishing.
#[derive(Debug, Clone)]
pub struct Emission {
    pub offset: u64,
    pub summary: StationSummary,
}

struct ShardJob {
    offset: u64,
    reading: ConvertedReading,
}

/// Keyed-parallel worker set over the aggregation engine.
///
/// Every station hashes to exactly one shard, so all updates for a station
/// are applied by a single writer in arrival order, while distinct stations
/// proceed concurrently on different shards.
pub struct ShardSet {
    senders: Vec<mpsc::Sender<ShardJob>>,
    handles: Vec<JoinHandle<Result<()>>>,
}

impl ShardSet {
    pub fn spawn(
        engine: Arc<AggregationEngine>,
        shards: usize,
        capacity: usize,
        out: mpsc::Sender<Emission>,
    ) -> Self {
        let shards = shards.max(1);
        let capacity = capacity.max(1);
        let mut senders = Vec::with_capacity(shards);
        let mut handles = Vec::with_capacity(shards);
        for id in 0..shards {
            let (tx, rx) = mpsc::channel(capacity);
            senders.push(tx);
            handles.push(tokio::spawn(run_shard(id, engine.clone(), rx, out.clone())));
        }
        info!(shards, "shard workers started");
        Self { senders, handles }
    }

    /// Route a converted reading to the shard owning its station.
    pub async fn dispatch(&self, offset: u64, reading: ConvertedReading) -> Result<()> {
        let index = shard_index(stage::key_of(&reading), self.senders.len());
        self.senders[index]
            .send(ShardJob { offset, reading })
            .await
            .map_err(|_| PipelineError::ShardStopped)
    }

    /// Close intake and wait for every shard to drain its queued updates.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.senders);
        for handle in self.handles {
            handle.await.map_err(|_| PipelineError::ShardStopped)??;
        }
        Ok(())
    }
}

fn shard_index(station: &str, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    station.hash(&mut hasher);
    (hasher.finish() % shards as u64) as usize
}

async fn run_shard(
    id: usize,
    engine: Arc<AggregationEngine>,
    mut jobs: mpsc::Receiver<ShardJob>,
    out: mpsc::Sender<Emission>,
) -> Result<()> {
    while let Some(job) = jobs.recv().await {
        let station = job.reading.station.clone();
        let state = engine.update(&station, &job.reading).await?;
        let summary = stage::project(&station, &state)?;
        if out
            .send(Emission {
                offset: job.offset,
                summary,
            })
            .await
            .is_err()
        {
            // Emitter gone; stop pulling so shutdown can proceed.
            break;
        }
    }
    debug!(shard = id, "shard drained");
    Ok(())
}
