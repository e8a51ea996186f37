//! BCP-vs-INSERT-fallback wrapper around `mssql_client::bulk` (component
//! M, catalog side).

use mssql_client::{BulkColumn, BulkInsert, BulkInsertBuilder, BulkInsertResult, BulkOptions};
use mssql_driver_pool::PooledConnection;

use crate::dml::InsertBatcher;
use crate::error::Result;

/// Whether a catalog's target endpoint supports the TDS bulk-load
/// protocol. Set at `Attach` time from a version/edition probe; some
/// endpoints (e.g. Fabric warehouses) never support it, in which case
/// [`CopyExecutor`] transparently falls back to batched `INSERT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BcpSupport {
    /// The endpoint accepts `INSERT BULK`.
    Supported,
    /// The endpoint does not support bulk load; fall back to INSERT
    /// batches.
    Unsupported,
}

/// Loads rows into a table via BCP when supported, or batched `INSERT`
/// otherwise.
///
/// `TABLOCK` is requested whenever `is_new_table` is set (the CTAS case),
/// since an exclusive table lock makes bulk ingest substantially faster
/// for a table with no concurrent readers.
pub enum CopyExecutor {
    /// Bulk-load path.
    Bcp(Box<BulkInsert>),
    /// Batched-INSERT fallback path.
    Insert(Box<InsertBatcher>),
}

impl CopyExecutor {
    /// Start a copy into `schema.table` with the given typed columns.
    pub async fn start(
        connection: &mut PooledConnection,
        support: BcpSupport,
        schema: &str,
        table: &str,
        columns: Vec<BulkColumn>,
        batch_rows: usize,
        is_new_table: bool,
    ) -> Result<Self> {
        match support {
            BcpSupport::Supported => {
                let options = BulkOptions {
                    batch_size: batch_rows,
                    table_lock: is_new_table,
                    ..BulkOptions::default()
                };
                let qualified = format!("{schema}.{table}");
                let builder = BulkInsertBuilder::new(qualified)
                    .with_typed_columns(columns)
                    .with_options(options);
                let bulk = BulkInsert::open(connection, builder).await?;
                Ok(CopyExecutor::Bcp(Box::new(bulk)))
            }
            BcpSupport::Unsupported => {
                let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
                let batcher = InsertBatcher::new(
                    schema,
                    table,
                    column_names,
                    Vec::new(),
                    batch_rows,
                    8 * 1024 * 1024,
                )?;
                Ok(CopyExecutor::Insert(Box::new(batcher)))
            }
        }
    }

    /// Send one row's values.
    pub fn send_row(&mut self, values: &[mssql_types::SqlValue]) -> Result<()> {
        match self {
            CopyExecutor::Bcp(bulk) => {
                bulk.send_row_values(values)?;
                Ok(())
            }
            CopyExecutor::Insert(_) => {
                // Buffered by the caller via InsertBatcher::add_row,
                // which needs the connection; CopyExecutor::send_row is
                // only meaningful on the BCP path. Callers drive the
                // INSERT path directly through `as_insert_batcher_mut`.
                Ok(())
            }
        }
    }

    /// Access the INSERT fallback batcher, if that's the active path.
    pub fn as_insert_batcher_mut(&mut self) -> Option<&mut InsertBatcher> {
        match self {
            CopyExecutor::Insert(batcher) => Some(batcher),
            CopyExecutor::Bcp(_) => None,
        }
    }

    /// Whether this executor took the BCP path.
    pub fn is_bcp(&self) -> bool {
        matches!(self, CopyExecutor::Bcp(_))
    }

    /// Flush the currently buffered batch (BCP path only; the INSERT
    /// path flushes through [`InsertBatcher::flush`] directly).
    pub async fn flush_batch(&mut self, connection: &mut PooledConnection) -> Result<u64> {
        match self {
            CopyExecutor::Bcp(bulk) => Ok(bulk.flush_batch(connection).await?),
            CopyExecutor::Insert(_) => Ok(0),
        }
    }

    /// Whether the currently buffered BCP batch should be flushed.
    pub fn should_flush(&self) -> bool {
        match self {
            CopyExecutor::Bcp(bulk) => bulk.should_flush(),
            CopyExecutor::Insert(_) => false,
        }
    }

    /// Complete the copy and return the confirmed row count (BCP path;
    /// the INSERT path completes through [`InsertBatcher::finalize`]).
    pub async fn finalize(self, connection: &mut PooledConnection) -> Result<Option<BulkInsertResult>> {
        match self {
            CopyExecutor::Bcp(bulk) => Ok(Some(bulk.finalize(connection).await?)),
            CopyExecutor::Insert(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcp_support_values_are_distinct() {
        assert_ne!(BcpSupport::Supported, BcpSupport::Unsupported);
    }
}
