use crate::core::{codec, PipelineError, RawRecord, RecordStream, Result, Source};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;

/// Line-oriented replay source: one `station,temperature,humidity` payload
/// per line. The record key mirrors the station field, matching how the bus
/// partitions by station.
pub struct FileSource {
    file_path: String,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_string_lossy().into_owned(),
        }
    }
}

#[async_trait]
impl Source for FileSource {
    async fn read(&self) -> Result<RecordStream> {
        let file = File::open(&self.file_path).await?;
        let reader = BufReader::new(file);
        let lines = LinesStream::new(reader.lines());

        let stream = lines.filter_map(|line_result| async move {
            match line_result {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        return None;
                    }
                    let key = line
                        .split(codec::FIELD_DELIMITER)
                        .next()
                        .unwrap_or_default()
                        .trim()
                        .to_string();
                    Some(Ok(RawRecord::new(key, line)))
                }
                Err(e) => Some(Err(PipelineError::Io(e))),
            }
        });

        Ok(Box::pin(stream))
    }
}
