use crate::config::ReaderSettings;
use crate::partition::{split_range, MongoPartition};
use crate::query::{connect, into_document_stream, query_error, range_filter};
use mongordd_common::{Document, Result};
use mongordd_connector::{Connector, DocumentStream};
use std::sync::Arc;

/// Reads one MongoDB collection as a set of key-range partitions.
///
/// The reader holds only its fixed settings. Every [`MongoReader::compute`]
/// call opens its own client, so calls for different partitions can run
/// concurrently.
#[derive(Debug, Clone)]
pub struct MongoReader {
    settings: Arc<ReaderSettings>,
}

impl MongoReader {
    pub fn new(settings: ReaderSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings: Arc::new(settings) })
    }

    /// Reader over a single partition spanning `[lower, upper]`.
    pub fn with_default_partitions(
        lower: i64,
        upper: i64,
        partition_key: &str,
        uri: &str,
        database: &str,
        collection: &str,
    ) -> Result<Self> {
        Self::builder(uri, database, collection)
            .partition_key(partition_key)
            .bounds(lower, upper)
            .build()
    }

    pub fn builder(uri: &str, database: &str, collection: &str) -> MongoReaderBuilder {
        MongoReaderBuilder::new(uri, database, collection)
    }

    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }

    pub fn num_partitions(&self) -> usize {
        self.settings.num_partitions
    }

    /// All partition descriptors, ordered by index.
    pub fn partitions(&self) -> Result<Vec<MongoPartition>> {
        split_range(self.settings.lower_bound, self.settings.upper_bound, self.settings.num_partitions)
    }

    /// The query sent to the server for `partition`.
    pub fn partition_filter(&self, partition: &MongoPartition) -> Document {
        range_filter(&self.settings.partition_key, partition)
    }

    /// Stream the documents whose partition key falls in `partition`.
    pub async fn compute(&self, partition: &MongoPartition) -> Result<DocumentStream> {
        let filter = self.partition_filter(partition);
        tracing::debug!(
            partition = partition.index(),
            database = %self.settings.database,
            collection = %self.settings.collection,
            filter = %filter,
            "computing partition"
        );

        let client = connect(&self.settings.uri, self.settings.connect_timeout()).await?;
        let collection = client
            .database(&self.settings.database)
            .collection::<Document>(&self.settings.collection);

        let cursor = match collection.find(filter).await {
            Ok(cursor) => cursor,
            Err(e) => {
                client.shutdown().await;
                let err = query_error(e);
                tracing::warn!(partition = partition.index(), error = %err, "range query failed");
                return Err(err);
            }
        };

        Ok(into_document_stream(client, cursor, *partition))
    }
}

#[async_trait::async_trait]
impl Connector for MongoReader {
    type Split = MongoPartition;

    fn partitions(&self) -> Result<Vec<MongoPartition>> {
        MongoReader::partitions(self)
    }

    async fn compute(&self, split: &MongoPartition) -> Result<DocumentStream> {
        MongoReader::compute(self, split).await
    }
}

/// Builder for [`MongoReader`]. Defaults to one partition, an `_id`
/// partition key and a 10 second connect timeout.
#[derive(Debug, Clone)]
pub struct MongoReaderBuilder {
    settings: ReaderSettings,
}

impl MongoReaderBuilder {
    pub fn new(uri: &str, database: &str, collection: &str) -> Self {
        Self {
            settings: ReaderSettings {
                uri: uri.to_string(),
                database: database.to_string(),
                collection: collection.to_string(),
                partition_key: "_id".to_string(),
                lower_bound: 0,
                upper_bound: 0,
                num_partitions: 1,
                connect_timeout_ms: 10_000,
            },
        }
    }

    pub fn partition_key(mut self, key: &str) -> Self {
        self.settings.partition_key = key.to_string();
        self
    }

    /// Closed interval `[lower, upper]` of partition key values.
    pub fn bounds(mut self, lower: i64, upper: i64) -> Self {
        self.settings.lower_bound = lower;
        self.settings.upper_bound = upper;
        self
    }

    pub fn num_partitions(mut self, num_partitions: usize) -> Self {
        self.settings.num_partitions = num_partitions;
        self
    }

    pub fn connect_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.settings.connect_timeout_ms = timeout_ms;
        self
    }

    pub fn build(self) -> Result<MongoReader> {
        MongoReader::new(self.settings)
    }
}
