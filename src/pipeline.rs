use crate::core::{codec, stage, ConvertedReading, RawRecord, Result, RetryPolicy, Sink, Source};
use crate::engine::{AggregationEngine, Emission, ShardSet, StateStore};
use futures::StreamExt;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of keyed shard workers.
    pub shards: usize,
    /// Capacity of each shard intake and of the emission channel.
    pub channel_capacity: usize,
    /// Backoff schedule for store and publish retries.
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            shards: 4,
            channel_capacity: 256,
            retry: RetryPolicy::default(),
        }
    }
}

/// Wires the stages into decode -> filter -> convert -> rekey -> keyed
/// update -> project -> publish, pulling from the source until it ends or a
/// shutdown signal arrives.
pub struct Pipeline {
    source: Box<dyn Source>,
    sink: Box<dyn Sink>,
    store: Arc<dyn StateStore>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        source: Box<dyn Source>,
        sink: Box<dyn Sink>,
        store: Arc<dyn StateStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            sink,
            store,
            config,
        }
    }

    /// Run until the source stream ends.
    pub async fn run(self) -> Result<()> {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        self.run_until(shutdown_rx).await
    }

    /// Run until the source stream ends or `shutdown` flips to `true`.
    ///
    /// Shutdown stops pulling new records but drains every update already
    /// dispatched to a shard, and flushes the sink, before returning.
    pub async fn run_until(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let Pipeline {
            source,
            sink,
            store,
            config,
        } = self;
        let source: Arc<dyn Source> = Arc::from(source);
        let engine = Arc::new(AggregationEngine::new(store).with_retry(config.retry.clone()));
        let tracker = Arc::new(Mutex::new(OffsetTracker::default()));

        let (emit_tx, emit_rx) = mpsc::channel(config.channel_capacity);
        let shards = ShardSet::spawn(
            engine,
            config.shards,
            config.channel_capacity,
            emit_tx,
        );
        let emitter = tokio::spawn(emit_loop(
            sink,
            source.clone(),
            tracker.clone(),
            emit_rx,
            config.retry,
        ));

        let mut stream = source.read().await?;
        let mut offset = 0u64;
        let mut failure = None;
        let mut shutdown_open = true;
        loop {
            tokio::select! {
                changed = shutdown.changed(), if shutdown_open => {
                    match changed {
                        Ok(()) if *shutdown.borrow() => {
                            info!("shutdown signal received, draining");
                            break;
                        }
                        Ok(()) => {}
                        Err(_) => shutdown_open = false,
                    }
                }
                next = stream.next() => {
                    match next {
                        Some(Ok(raw)) => {
                            offset += 1;
                            let step = match prepare(raw) {
                                Some(converted) => shards.dispatch(offset, converted).await,
                                // Dropped records are complete as soon as
                                // they are dropped.
                                None => commit_completed(&tracker, source.as_ref(), offset).await,
                            };
                            if let Err(err) = step {
                                failure = Some(err);
                                break;
                            }
                        }
                        Some(Err(err)) => {
                            failure = Some(err);
                            break;
                        }
                        None => {
                            debug!(records = offset, "source stream ended");
                            break;
                        }
                    }
                }
            }
        }
        drop(stream);

        // In-flight updates finish and are reflected in the store before the
        // emitter and source are torn down.
        let drained = shards.shutdown().await;
        let emitted = match emitter.await {
            Ok(res) => res,
            Err(_) => Err(crate::core::PipelineError::ShardStopped),
        };
        source.close().await?;

        match (failure, drained, emitted) {
            // An emitter death shows up at the driver as a dead dispatch;
            // the publish failure is the root cause.
            (_, _, Err(err)) => Err(err),
            // Likewise a shard failure behind a failed dispatch.
            (_, Err(err), _) => Err(err),
            (Some(err), Ok(()), Ok(())) => Err(err),
            (None, Ok(()), Ok(())) => Ok(()),
        }
    }
}

/// Completion bookkeeping for pulled offsets. An offset is complete once its
/// record was published, filtered out, or dropped as malformed. Shards
/// finish out of order across stations, so only the contiguous prefix of
/// complete offsets is safe to commit: replay resumes right after the
/// cursor, and an uncommitted gap would otherwise be lost.
#[derive(Debug, Default)]
struct OffsetTracker {
    watermark: u64,
    done: BTreeSet<u64>,
}

impl OffsetTracker {
    /// Record `offset` (1-based) as complete, returning the new watermark
    /// when the contiguous prefix advanced.
    fn complete(&mut self, offset: u64) -> Option<u64> {
        self.done.insert(offset);
        let before = self.watermark;
        while self.done.remove(&(self.watermark + 1)) {
            self.watermark += 1;
        }
        (self.watermark > before).then_some(self.watermark)
    }
}

/// Mark `offset` complete and, when the low-watermark advanced, commit it to
/// the source.
async fn commit_completed(
    tracker: &Mutex<OffsetTracker>,
    source: &dyn Source,
    offset: u64,
) -> Result<()> {
    let advanced = tracker.lock().await.complete(offset);
    if let Some(watermark) = advanced {
        source.commit(watermark).await?;
    }
    Ok(())
}

/// Decode, filter, and convert one raw record. Returns `None` when the
/// record is consumed here: malformed payloads are dropped, readings at or
/// below the threshold are filtered out.
fn prepare(raw: RawRecord) -> Option<ConvertedReading> {
    let reading = match codec::decode(&raw) {
        Ok(reading) => reading,
        Err(err) => {
            warn!(%err, key = %raw.key, "dropping malformed record");
            return None;
        }
    };
    if !stage::accept(&reading) {
        trace!(station = %reading.station, temperature_c = reading.temperature_c, "filtered out");
        return None;
    }
    let converted = stage::convert(reading);
    trace!(station = %converted.station, temperature_f = converted.temperature_f, "converted");
    Some(converted)
}

/// Publish each emitted summary, then mark its offset complete so the
/// low-watermark can advance. Publish failures are retried with backoff; the
/// aggregate behind the summary is already durable, so a retry re-sends
/// identical content.
async fn emit_loop(
    mut sink: Box<dyn Sink>,
    source: Arc<dyn Source>,
    tracker: Arc<Mutex<OffsetTracker>>,
    mut emissions: mpsc::Receiver<Emission>,
    retry: RetryPolicy,
) -> Result<()> {
    while let Some(Emission { offset, summary }) = emissions.recv().await {
        let mut attempt = 0;
        loop {
            match sink
                .publish(&summary.station, &summary.formatted_text)
                .await
            {
                Ok(()) => break,
                Err(err) if attempt + 1 < retry.max_attempts => {
                    let delay = retry.delay_for(attempt);
                    warn!(station = %summary.station, %err, ?delay, attempt, "publish failed, retrying");
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
        debug!(station = %summary.station, offset, "summary published");
        commit_completed(&tracker, source.as_ref(), offset).await?;
    }
    sink.close().await
}
