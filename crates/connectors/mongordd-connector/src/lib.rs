use futures::stream::BoxStream;
use mongordd_common::{Document, Result};

/// Lazy, single-pass sequence of documents produced for one split.
///
/// The stream ends after the first `Err`.
pub type DocumentStream = BoxStream<'static, Result<Document>>;

/// A Split is an opaque handle to a unit of work for a connector.
/// For a database, it is a range of partition key values.
pub trait Split: Clone + Send + Sync + 'static {
    /// Position of this split among its siblings.
    fn index(&self) -> usize;
}

/// The core trait for any mongordd data source connector.
///
/// `partitions` is cheap and deterministic. `compute` may be called
/// concurrently for different splits; each call is self-contained.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    type Split: Split;

    /// Return every split of the source, ordered by index.
    fn partitions(&self) -> Result<Vec<Self::Split>>;

    /// Given a split, return a stream of its documents.
    async fn compute(&self, split: &Self::Split) -> Result<DocumentStream>;
}
