use futures::stream::{self, StreamExt};
use mongodb::bson::{doc, Document};
use mongordd_common::{Error, Result};
use mongordd_connector::{Connector, DocumentStream, Split};
use mongordd_connector_mongodb::MongoReader;
use mongordd_engine::LocalExecutor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
struct SliceSplit(usize);

impl Split for SliceSplit {
    fn index(&self) -> usize {
        self.0
    }
}

/// Serves fixed documents per split and records how it was used.
#[derive(Default)]
struct InMemoryConnector {
    splits: Vec<Vec<Document>>,
    failing_split: Option<usize>,
    delay: Option<Duration>,
    opened: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl InMemoryConnector {
    /// `sizes[i]` documents in split `i`, numbered globally from 0.
    fn with_sizes(sizes: &[usize]) -> Self {
        let mut next = 0i64;
        let splits = sizes
            .iter()
            .map(|&size| {
                (0..size)
                    .map(|_| {
                        let d = doc! { "seq": next };
                        next += 1;
                        d
                    })
                    .collect()
            })
            .collect();
        Self { splits, ..Default::default() }
    }
}

struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Connector for InMemoryConnector {
    type Split = SliceSplit;

    fn partitions(&self) -> Result<Vec<SliceSplit>> {
        Ok((0..self.splits.len()).map(SliceSplit).collect())
    }

    async fn compute(&self, split: &SliceSplit) -> Result<DocumentStream> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if self.failing_split == Some(split.0) {
            return Err(Error::Query(format!("split {} failed", split.0)));
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlightGuard(self.in_flight.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let docs = self.splits[split.0].clone();
        // the guard lives until the stream is dropped
        Ok(stream::iter(docs.into_iter().map(Ok::<Document, Error>))
            .map(move |d| {
                let _guard = &guard;
                d
            })
            .boxed())
    }
}

fn seqs(docs: &[Document]) -> Vec<i64> {
    docs.iter().map(|d| d.get_i64("seq").unwrap()).collect()
}

#[tokio::test]
async fn test_collect_concatenates_in_split_order() {
    let executor = LocalExecutor::new(InMemoryConnector::with_sizes(&[3, 0, 4, 2]));
    let docs = executor.collect().await.unwrap();
    assert_eq!(seqs(&docs), (0..9).collect::<Vec<i64>>());
    assert_eq!(executor.connector().opened.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_collect_partition_reads_one_split() {
    let executor = LocalExecutor::new(InMemoryConnector::with_sizes(&[2, 3]));
    let docs = executor.collect_partition(&SliceSplit(1)).await.unwrap();
    assert_eq!(seqs(&docs), vec![2, 3, 4]);
}

#[tokio::test]
async fn test_count_sums_splits() {
    let executor = LocalExecutor::new(InMemoryConnector::with_sizes(&[5, 5, 0, 1]));
    assert_eq!(executor.count().await.unwrap(), 11);
}

#[tokio::test]
async fn test_take_stops_opening_splits() {
    let executor = LocalExecutor::new(InMemoryConnector::with_sizes(&[2, 2, 2, 2]));
    let docs = executor.take(3).await.unwrap();
    assert_eq!(seqs(&docs), vec![0, 1, 2]);
    assert_eq!(executor.connector().opened.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_take_more_than_available() {
    let executor = LocalExecutor::new(InMemoryConnector::with_sizes(&[1, 0, 2]));
    let docs = executor.take(100).await.unwrap();
    assert_eq!(seqs(&docs), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_take_zero_opens_nothing() {
    let executor = LocalExecutor::new(InMemoryConnector::with_sizes(&[2, 2]));
    assert!(executor.take(0).await.unwrap().is_empty());
    assert_eq!(executor.connector().opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_collect_propagates_first_failure() {
    let connector = InMemoryConnector { failing_split: Some(2), ..InMemoryConnector::with_sizes(&[1, 1, 1, 1]) };
    let executor = LocalExecutor::new(connector);
    let err = executor.collect().await.unwrap_err();
    assert!(matches!(err, Error::Query(_)), "unexpected error: {:?}", err);
}

#[tokio::test]
async fn test_max_concurrency_is_respected() {
    let connector = InMemoryConnector {
        delay: Some(Duration::from_millis(20)),
        ..InMemoryConnector::with_sizes(&[1; 8])
    };
    let executor = LocalExecutor::new(connector).with_max_concurrency(2).unwrap();
    assert_eq!(executor.count().await.unwrap(), 8);
    let peak = executor.connector().peak_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 2, "peak in-flight splits was {}", peak);
}

#[test]
fn test_zero_concurrency_is_invalid() {
    let result = LocalExecutor::new(InMemoryConnector::default()).with_max_concurrency(0);
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

#[tokio::test]
async fn test_collect_over_unreachable_mongo_is_connection_error() -> std::result::Result<(), anyhow::Error> {
    let reader = MongoReader::builder("mongodb://127.0.0.1:1/?directConnection=true", "shop", "orders")
        .partition_key("order_id")
        .bounds(0, 99)
        .num_partitions(4)
        .connect_timeout_ms(300)
        .build()?;
    let executor = LocalExecutor::new(reader).with_max_concurrency(2)?;
    let err = executor.collect().await.unwrap_err();
    assert!(matches!(err, Error::Connection(_)), "unexpected error: {:?}", err);
    Ok(())
}

#[tokio::test]
async fn test_take_surfaces_split_failure() -> std::result::Result<(), anyhow::Error> {
    let connector = InMemoryConnector { failing_split: Some(1), ..InMemoryConnector::with_sizes(&[1, 5]) };
    let executor = LocalExecutor::new(connector);
    // the first split alone satisfies take(1), so the failing one is never opened
    assert_eq!(seqs(&executor.take(1).await?), vec![0]);
    let err = executor.take(2).await.unwrap_err();
    assert!(matches!(err, Error::Query(_)), "unexpected error: {:?}", err);
    Ok(())
}
