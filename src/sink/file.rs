use crate::core::{Result, Sink};
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};

#[derive(Serialize)]
struct SummaryLine<'a> {
    station: &'a str,
    summary: &'a str,
}

/// JSON-lines sink for emitted summaries, one object per publish.
pub struct FileSink {
    file_path: String,
    writer: Option<BufWriter<tokio::fs::File>>,
}

impl FileSink {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_string_lossy().into_owned(),
            writer: None,
        }
    }

    async fn ensure_writer(&mut self) -> Result<()> {
        if self.writer.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.file_path)
                .await?;
            self.writer = Some(BufWriter::new(file));
        }
        Ok(())
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn publish(&mut self, key: &str, value: &str) -> Result<()> {
        self.ensure_writer().await?;

        let line = serde_json::to_string(&SummaryLine {
            station: key,
            summary: value,
        })?;

        if let Some(ref mut writer) = self.writer {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }

        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush().await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.flush().await?;
        self.writer = None;
        Ok(())
    }
}
