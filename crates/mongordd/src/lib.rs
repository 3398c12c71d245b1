//! Read a MongoDB collection as a set of key-range partitions.
//!
//! Re-exports the pieces most callers need, plus the helpers the
//! `mongordd` binary uses to render partitions and documents.

pub use mongordd_common::{Document, Error, Result};
pub use mongordd_connector::{Connector, DocumentStream, Split};
pub use mongordd_connector_mongodb::{split_range, MongoPartition, MongoReader, MongoReaderBuilder, ReaderSettings};
pub use mongordd_engine::LocalExecutor;

use mongodb::bson::Bson;

/// One line per partition: index, bounds and the filter sent to the server.
pub fn describe_partition(reader: &MongoReader, partition: &MongoPartition) -> String {
    let close = if partition.is_upper_inclusive() { ']' } else { ')' };
    format!(
        "{}\t[{}, {}{}\t{}",
        partition.index(),
        partition.lower(),
        partition.upper(),
        close,
        reader.partition_filter(partition)
    )
}

/// Relaxed extended JSON rendering of a document.
pub fn document_to_json(document: Document) -> serde_json::Value {
    Bson::Document(document).into_relaxed_extjson()
}

/// Select the partitions a scan should read. `None` means all of them.
pub fn select_partitions(reader: &MongoReader, index: Option<usize>) -> Result<Vec<MongoPartition>> {
    let partitions = reader.partitions()?;
    match index {
        None => Ok(partitions),
        Some(i) => partitions.get(i).map(|p| vec![*p]).ok_or_else(|| {
            Error::invalid_argument(format!("partition {} out of range, reader has {}", i, partitions.len()))
        }),
    }
}
