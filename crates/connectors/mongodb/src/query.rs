//! Per-partition range queries and cursor adaptation.

use crate::partition::MongoPartition;
use futures::stream::{StreamExt, TryStreamExt};
use mongodb::bson::doc;
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::{Client, Cursor};
use mongordd_common::{Document, Error, Result};
use mongordd_connector::DocumentStream;
use std::time::Duration;

/// `{ <key>: { $gte: lower, $lt: upper } }`, or `$lte` for a closed partition.
pub fn range_filter(partition_key: &str, partition: &MongoPartition) -> Document {
    let upper_op = if partition.is_upper_inclusive() { "$lte" } else { "$lt" };
    let mut bounds = doc! { "$gte": partition.lower() };
    bounds.insert(upper_op, partition.upper());
    let mut filter = Document::new();
    filter.insert(partition_key, bounds);
    filter
}

/// Open a client for `uri` and make sure a server answers within `timeout`.
///
/// Every failure on this path, including a malformed URI, is a
/// connection error.
pub(crate) async fn connect(uri: &str, timeout: Duration) -> Result<Client> {
    let attempt = async {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| Error::Connection(format!("invalid connection string: {}", e)))?;
        // Explicit timeouts in the URI win; the outer bound below still applies.
        if options.connect_timeout.is_none() {
            options.connect_timeout = Some(timeout);
        }
        if options.server_selection_timeout.is_none() {
            options.server_selection_timeout = Some(timeout);
        }

        let client = Client::with_options(options).map_err(|e| Error::Connection(e.to_string()))?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok::<_, Error>(client)
    };

    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(client)) => {
            tracing::info!("connected to mongodb");
            Ok(client)
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "mongodb connection failed");
            Err(e)
        }
        Err(_) => {
            tracing::warn!(?timeout, "mongodb connection timed out");
            Err(Error::Connection(format!("timed out after {:?}", timeout)))
        }
    }
}

/// Map a driver failure raised after the connection was established.
pub(crate) fn query_error(err: mongodb::error::Error) -> Error {
    match *err.kind {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::DnsResolve { .. }
        | ErrorKind::Authentication { .. }
        | ErrorKind::ConnectionPoolCleared { .. } => Error::Connection(err.to_string()),
        _ => Error::Query(err.to_string()),
    }
}

struct OpenCursor {
    client: Client,
    cursor: Cursor<Document>,
}

/// Adapt a cursor into a [`DocumentStream`] that owns its client.
///
/// The client is shut down once the cursor is exhausted or fails. A stream
/// dropped before that drops the client, which releases its pool.
pub(crate) fn into_document_stream(
    client: Client,
    cursor: Cursor<Document>,
    partition: MongoPartition,
) -> DocumentStream {
    futures::stream::try_unfold(OpenCursor { client, cursor }, move |state| async move {
        let OpenCursor { client, mut cursor } = state;
        match cursor.try_next().await {
            Ok(Some(document)) => Ok(Some((document, OpenCursor { client, cursor }))),
            Ok(None) => {
                drop(cursor);
                client.shutdown().await;
                tracing::debug!(partition = partition.index(), "partition exhausted");
                Ok(None)
            }
            Err(e) => {
                drop(cursor);
                client.shutdown().await;
                let err = query_error(e);
                tracing::warn!(partition = partition.index(), error = %err, "partition cursor failed");
                Err(err)
            }
        }
    })
    .boxed()
}
