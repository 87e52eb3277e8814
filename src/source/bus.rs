use crate::core::{PipelineError, RawRecord, RecordStream, Result, Source};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;

/// Observable consumer cursor for a [`BusSource`].
#[derive(Debug, Clone, Default)]
pub struct BusCursor(Arc<AtomicU64>);

impl BusCursor {
    /// Highest committed offset so far (0 when nothing was committed).
    pub fn position(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Channel-backed bus consumer. Producers push `RawRecord`s through the
/// sender half; dropping the sender ends the stream. Delivery is per-key
/// ordered because the channel preserves send order.
pub struct BusSource {
    receiver: Mutex<Option<mpsc::Receiver<RawRecord>>>,
    cursor: BusCursor,
}

impl BusSource {
    pub fn channel(capacity: usize) -> (mpsc::Sender<RawRecord>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            tx,
            Self {
                receiver: Mutex::new(Some(rx)),
                cursor: BusCursor::default(),
            },
        )
    }

    /// Handle on the durable cursor, kept valid after the source is moved
    /// into a pipeline.
    pub fn cursor(&self) -> BusCursor {
        self.cursor.clone()
    }
}

#[async_trait]
impl Source for BusSource {
    async fn read(&self) -> Result<RecordStream> {
        let rx = self
            .receiver
            .lock()
            .await
            .take()
            .ok_or_else(|| PipelineError::Source(anyhow::anyhow!("bus source already consumed")))?;
        Ok(Box::pin(ReceiverStream::new(rx).map(Ok)))
    }

    async fn commit(&self, offset: u64) -> Result<()> {
        // Cursor only moves forward; a stale commit never rewinds it.
        self.cursor.0.fetch_max(offset, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_records_in_send_order_then_ends() {
        let (tx, source) = BusSource::channel(8);
        tx.send(RawRecord::new("A", "A,35,60")).await.unwrap();
        tx.send(RawRecord::new("B", "B,40,70")).await.unwrap();
        drop(tx);

        let mut stream = source.read().await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap().key, "A");
        assert_eq!(stream.next().await.unwrap().unwrap().key, "B");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn commit_is_monotone() {
        let (_tx, source) = BusSource::channel(1);
        let cursor = source.cursor();
        source.commit(3).await.unwrap();
        source.commit(1).await.unwrap();
        assert_eq!(cursor.position(), 3);
        source.commit(7).await.unwrap();
        assert_eq!(cursor.position(), 7);
    }

    #[tokio::test]
    async fn second_read_fails() {
        let (_tx, source) = BusSource::channel(1);
        source.read().await.unwrap();
        assert!(source.read().await.is_err());
    }
}
