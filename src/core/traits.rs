use crate::core::{RawRecord, Result};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

pub type RecordStream = Pin<Box<dyn Stream<Item = Result<RawRecord>> + Send>>;

/// Event bus consumer. Delivers records in per-key order with at-least-once
/// semantics and exposes a durable cursor the driver commits once a record's
/// update is reflected in the state store and published.
#[async_trait]
pub trait Source: Send + Sync {
    async fn read(&self) -> Result<RecordStream>;

    /// Advance the durable cursor past `offset`. Advisory and monotone;
    /// the default source keeps no cursor.
    async fn commit(&self, _offset: u64) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Event bus producer, called once per emitted summary with the station as
/// the key and the formatted text as the value.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn publish(&mut self, key: &str, value: &str) -> Result<()>;

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.flush().await
    }
}
