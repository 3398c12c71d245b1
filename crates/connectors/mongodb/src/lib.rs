//! MongoDB connector
//!
//! Reads a collection as `num_partitions` contiguous ranges of an integer
//! partition key. Each partition becomes one
//! `{ key: { $gte: lower, $lt: upper } }` query on its own client.
//!
//! # Example
//! ```rust
//! use mongordd_connector_mongodb::MongoReader;
//!
//! let reader = MongoReader::builder("mongodb://localhost:27017", "shop", "orders")
//!     .partition_key("order_id")
//!     .bounds(0, 99)
//!     .num_partitions(4)
//!     .build()
//!     .unwrap();
//! let partitions = reader.partitions().unwrap();
//! assert_eq!(partitions.len(), 4);
//! assert_eq!(partitions[3].upper(), 100);
//! ```

pub mod config;
pub mod partition;
mod query;
mod reader;

pub use config::ReaderSettings;
pub use partition::{split_range, MongoPartition};
pub use query::range_filter;
pub use reader::{MongoReader, MongoReaderBuilder};
