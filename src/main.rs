use std::sync::Arc;
use tokio::sync::watch;
use weatherflow::sink::FileSink;
use weatherflow::source::FileSource;
use weatherflow::{MemoryStateStore, Pipeline, PipelineConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let source = Box::new(FileSource::new("readings.csv"));
    let sink = Box::new(FileSink::new("station-averages.jsonl"));
    let store = Arc::new(MemoryStateStore::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let pipeline = Pipeline::new(source, sink, store, PipelineConfig::default());
    pipeline.run_until(shutdown_rx).await?;

    Ok(())
}
