use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use weatherflow::sink::BusSink;
use weatherflow::source::BusSource;
use weatherflow::{
    AggregateState, MemoryStateStore, Pipeline, PipelineConfig, PipelineError, RawRecord,
    RetryPolicy, StateStore, StoreError,
};

const RUN_TIMEOUT: Duration = Duration::from_secs(10);

async fn run_pipeline(
    payloads: &[&str],
) -> (Arc<MemoryStateStore>, Vec<(String, String)>, u64) {
    // Everything is queued up front and only drained after the run, so both
    // channels must hold the whole load.
    let (producer, source) = BusSource::channel(payloads.len() + 1);
    let cursor = source.cursor();
    let (sink, mut published_rx) = BusSink::channel(payloads.len() + 1);
    let store = Arc::new(MemoryStateStore::new());

    for payload in payloads {
        let key = payload.split(',').next().unwrap_or_default();
        producer
            .send(RawRecord::new(key, *payload))
            .await
            .unwrap();
    }
    drop(producer);

    let pipeline = Pipeline::new(
        Box::new(source),
        Box::new(sink),
        store.clone(),
        PipelineConfig::default(),
    );
    timeout(RUN_TIMEOUT, pipeline.run())
        .await
        .expect("pipeline hung")
        .expect("pipeline failed");

    let mut published = Vec::new();
    while let Some(message) = published_rx.recv().await {
        published.push(message);
    }
    (store, published, cursor.position())
}

#[tokio::test]
async fn filters_converts_aggregates_and_emits() {
    let (store, published, _) = run_pipeline(&["A,25,50", "A,35,60", "B,40,70"]).await;

    // "A,25,50" is filtered out and must leave no trace in the store.
    let a = store.get("A").await.unwrap().unwrap();
    assert_eq!(a.count, 1);
    assert_eq!(a.sum_temp_f, 95.0);
    assert_eq!(a.sum_humidity, 60.0);

    let b = store.get("B").await.unwrap().unwrap();
    assert_eq!(b.count, 1);
    assert_eq!(b.sum_temp_f, 104.0);
    assert_eq!(b.sum_humidity, 70.0);

    let by_station: HashMap<String, Vec<String>> =
        published
            .into_iter()
            .fold(HashMap::new(), |mut acc, (key, value)| {
                acc.entry(key).or_default().push(value);
                acc
            });
    assert_eq!(
        by_station["A"],
        vec!["A : Average Temperature = 95.00°F, Average Humidity = 60.0%"]
    );
    assert_eq!(
        by_station["B"],
        vec!["B : Average Temperature = 104.00°F, Average Humidity = 70.0%"]
    );
}

#[tokio::test]
async fn every_update_reemits_the_running_average() {
    let (store, published, _) = run_pipeline(&["A,35,60", "A,32,40"]).await;

    let a = store.get("A").await.unwrap().unwrap();
    assert_eq!(a.count, 2);
    assert!((a.sum_temp_f - 184.6).abs() < 1e-9);
    assert!((a.sum_humidity - 100.0).abs() < 1e-9);

    let values: Vec<String> = published
        .into_iter()
        .filter(|(key, _)| key == "A")
        .map(|(_, value)| value)
        .collect();
    assert_eq!(
        values,
        vec![
            "A : Average Temperature = 95.00°F, Average Humidity = 60.0%",
            "A : Average Temperature = 92.30°F, Average Humidity = 50.0%",
        ]
    );
}

#[tokio::test]
async fn malformed_payloads_are_dropped_without_aggregating() {
    let (store, published, _) = run_pipeline(&[
        "garbage",
        "A,not-a-number,60",
        "A,35,60,extra",
        "A,35",
        "B,40,70",
    ])
    .await;

    assert_eq!(store.get("A").await.unwrap(), None);
    assert_eq!(store.get("B").await.unwrap().unwrap().count, 1);
    assert_eq!(published.len(), 1);
}

/// Store whose partition for one station is down: every put for it reports
/// `Unavailable`.
struct DownPartitionStore {
    inner: MemoryStateStore,
    down_station: &'static str,
}

#[async_trait]
impl StateStore for DownPartitionStore {
    async fn get(&self, station: &str) -> Result<Option<AggregateState>, StoreError> {
        self.inner.get(station).await
    }

    async fn put(&self, station: &str, state: &AggregateState) -> Result<(), StoreError> {
        if station == self.down_station {
            return Err(StoreError::Unavailable("partition down".to_string()));
        }
        self.inner.put(station, state).await
    }

    async fn snapshot(&self) -> Result<BTreeMap<String, AggregateState>, StoreError> {
        self.inner.snapshot().await
    }

    async fn restore(&self, entries: BTreeMap<String, AggregateState>) -> Result<(), StoreError> {
        self.inner.restore(entries).await
    }
}

#[tokio::test(start_paused = true)]
async fn cursor_never_advances_past_an_unstored_reading() {
    let (producer, source) = BusSource::channel(16);
    let cursor = source.cursor();
    let (sink, published_rx) = BusSink::channel(16);
    let store = Arc::new(DownPartitionStore {
        inner: MemoryStateStore::new(),
        down_station: "A",
    });

    // Offset 1 can never be stored; later offsets for B may complete.
    producer.send(RawRecord::new("A", "A,35,60")).await.unwrap();
    for _ in 0..5 {
        producer.send(RawRecord::new("B", "B,40,70")).await.unwrap();
    }
    drop(producer);

    let pipeline = Pipeline::new(
        Box::new(source),
        Box::new(sink),
        store.clone(),
        PipelineConfig::default(),
    );
    let result = timeout(RUN_TIMEOUT, pipeline.run())
        .await
        .expect("pipeline hung");
    assert!(matches!(
        result,
        Err(PipelineError::Store(StoreError::Unavailable(_)))
    ));

    // A's reading never reached the store, so the cursor must not claim it:
    // replay from the committed cursor has to re-deliver offset 1.
    assert_eq!(cursor.position(), 0);
    assert_eq!(store.inner.get("A").await.unwrap(), None);
    drop(published_rx);
}

#[tokio::test]
async fn publish_failure_surfaces_as_the_root_cause() {
    let records = 50usize;
    let (producer, source) = BusSource::channel(records + 1);
    let (sink, published_rx) = BusSink::channel(4);
    // Bus is down from the start; the emitter dies once retries run out and
    // the stalled shards take the driver down with it.
    drop(published_rx);
    let store = Arc::new(MemoryStateStore::new());

    for _ in 0..records {
        producer.send(RawRecord::new("A", "A,35,60")).await.unwrap();
    }
    drop(producer);

    let config = PipelineConfig {
        shards: 2,
        channel_capacity: 4,
        retry: RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2), 0.0),
    };
    let pipeline = Pipeline::new(Box::new(source), Box::new(sink), store, config);
    let result = timeout(RUN_TIMEOUT, pipeline.run())
        .await
        .expect("pipeline hung");
    assert!(matches!(result, Err(PipelineError::Publish(_))));
}

#[tokio::test]
async fn cursor_is_committed_after_publish() {
    // Offsets are 1-based over all pulled records; the last survivor is the
    // third record, so the cursor must reach at least 3.
    let (_, published, cursor) = run_pipeline(&["A,35,60", "A,10,50", "B,40,70"]).await;
    assert_eq!(published.len(), 2);
    assert_eq!(cursor, 3);
}

#[tokio::test]
async fn concurrent_stations_keep_independent_counts() {
    let stations = ["S0", "S1", "S2", "S3", "S4", "S5"];
    let per_station = 20;
    let mut payloads = Vec::new();
    for round in 0..per_station {
        for station in &stations {
            payloads.push(format!("{station},{},50", 31 + round));
        }
    }
    let borrowed: Vec<&str> = payloads.iter().map(String::as_str).collect();

    let (store, published, _) = run_pipeline(&borrowed).await;

    assert_eq!(published.len(), stations.len() * per_station);
    for station in &stations {
        let state = store.get(station).await.unwrap().unwrap();
        assert_eq!(state.count, per_station as i64);
    }
}

#[tokio::test]
async fn shutdown_signal_stops_the_pipeline() {
    let (producer, source) = BusSource::channel(64);
    let (sink, mut published_rx) = BusSink::channel(64);
    let store = Arc::new(MemoryStateStore::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    producer.send(RawRecord::new("A", "A,35,60")).await.unwrap();

    let pipeline = Pipeline::new(
        Box::new(source),
        Box::new(sink),
        store.clone(),
        PipelineConfig::default(),
    );
    let runner = tokio::spawn(pipeline.run_until(shutdown_rx));

    // Wait for the queued record to make it through before signalling.
    let first = timeout(RUN_TIMEOUT, published_rx.recv())
        .await
        .expect("no emission before shutdown")
        .expect("sink closed early");
    assert_eq!(first.0, "A");

    shutdown_tx.send(true).unwrap();
    timeout(RUN_TIMEOUT, runner)
        .await
        .expect("pipeline did not honor shutdown")
        .unwrap()
        .unwrap();

    // The accepted reading was durably reflected before exit.
    assert_eq!(store.get("A").await.unwrap().unwrap().count, 1);
    drop(producer);
}
