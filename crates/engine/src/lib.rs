//! Engine crate
//!
//! A small in-process host for partitioned connectors. It lists a
//! connector's splits and materializes them on tokio tasks.
//!
//! # Example
//! ```rust,no_run
//! use mongordd_connector_mongodb::MongoReader;
//! use mongordd_engine::LocalExecutor;
//!
//! # async fn run() -> mongordd_common::Result<()> {
//! let reader = MongoReader::builder("mongodb://localhost:27017", "shop", "orders")
//!     .partition_key("order_id")
//!     .bounds(0, 99_999)
//!     .num_partitions(8)
//!     .build()?;
//! let executor = LocalExecutor::new(reader).with_max_concurrency(4)?;
//! let first_ten = executor.take(10).await?;
//! # Ok(())
//! # }
//! ```

use futures::TryStreamExt;
use mongordd_common::{Document, Error, Result};
use mongordd_connector::{Connector, Split};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Runs a [`Connector`]'s splits on the current tokio runtime.
pub struct LocalExecutor<C> {
    connector: Arc<C>,
    max_concurrency: Option<usize>,
}

impl<C> Clone for LocalExecutor<C> {
    fn clone(&self) -> Self {
        Self { connector: self.connector.clone(), max_concurrency: self.max_concurrency }
    }
}

impl<C: Connector + 'static> LocalExecutor<C> {
    pub fn new(connector: C) -> Self {
        Self::from_arc(Arc::new(connector))
    }

    pub fn from_arc(connector: Arc<C>) -> Self {
        Self { connector, max_concurrency: None }
    }

    /// Limit how many partitions are materialized at once.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Result<Self> {
        if max_concurrency == 0 {
            return Err(Error::invalid_argument("max_concurrency must be at least 1"));
        }
        self.max_concurrency = Some(max_concurrency);
        Ok(self)
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// All documents of one split.
    pub async fn collect_partition(&self, split: &C::Split) -> Result<Vec<Document>> {
        self.connector.compute(split).await?.try_collect().await
    }

    /// All documents of every split, concatenated in split order.
    ///
    /// Splits are read concurrently. The first failure cancels the
    /// remaining reads.
    pub async fn collect(&self) -> Result<Vec<Document>> {
        let per_split = self
            .run_all(|connector: Arc<C>, split: C::Split| async move {
                connector.compute(&split).await?.try_collect::<Vec<_>>().await
            })
            .await?;
        Ok(per_split.into_iter().flatten().collect())
    }

    pub async fn count(&self) -> Result<u64> {
        let per_split = self
            .run_all(|connector: Arc<C>, split: C::Split| async move {
                connector
                    .compute(&split)
                    .await?
                    .try_fold(0u64, |n, _| async move { Ok::<_, Error>(n + 1) })
                    .await
            })
            .await?;
        Ok(per_split.into_iter().sum())
    }

    /// Up to `n` documents, reading splits one at a time in order.
    ///
    /// Splits after the one that fills the result are never opened.
    pub async fn take(&self, n: usize) -> Result<Vec<Document>> {
        let mut taken = Vec::new();
        if n == 0 {
            return Ok(taken);
        }

        for split in self.connector.partitions()? {
            let mut stream = self.connector.compute(&split).await?;
            while let Some(document) = stream.try_next().await? {
                taken.push(document);
                if taken.len() == n {
                    tracing::debug!(n, last_split = split.index(), "take satisfied");
                    return Ok(taken);
                }
            }
        }
        Ok(taken)
    }

    async fn run_all<T, F, Fut>(&self, task: F) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: Fn(Arc<C>, C::Split) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let splits = self.connector.partitions()?;
        let semaphore = self.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));
        tracing::debug!(splits = splits.len(), max_concurrency = ?self.max_concurrency, "running splits");

        let mut tasks = JoinSet::new();
        for split in splits {
            let index = split.index();
            let work = task(self.connector.clone(), split);
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => {
                        Some(semaphore.acquire_owned().await.map_err(|e| Error::Execution(e.to_string()))?)
                    }
                    None => None,
                };
                work.await.map(|value| (index, value))
            });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(|e| Error::Execution(format!("split task failed: {}", e)))?;
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::warn!(error = %e, kind = e.kind(), "split failed, cancelling the rest");
                    return Err(e);
                }
            }
        }

        results.sort_by_key(|(index, _)| *index);
        Ok(results.into_iter().map(|(_, value)| value).collect())
    }
}
