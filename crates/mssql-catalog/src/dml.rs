//! DML batcher (component L): shared batching/statement-generation logic
//! for INSERT, UPDATE, and DELETE executors.

use mssql_client::{Client, InTransaction};
use mssql_driver_pool::PooledConnection;
use mssql_types::SqlValue;

use crate::error::{CatalogError, Result};
use crate::pushdown::bracket_identifier;

/// Runs a statement against whatever connection a batcher is driven with.
///
/// Lets [`InsertBatcher`]/[`KeyedBatcher`] run identically against a plain
/// pooled connection or against the connection pinned to a host
/// transaction, without the batcher caring which.
pub trait SqlExecutor {
    /// Execute `sql` with no parameters, returning the affected row count.
    fn execute_sql(
        &mut self,
        sql: &str,
    ) -> impl std::future::Future<Output = std::result::Result<u64, mssql_client::Error>> + Send;
}

impl SqlExecutor for PooledConnection {
    async fn execute_sql(&mut self, sql: &str) -> std::result::Result<u64, mssql_client::Error> {
        let client: &mut Client<mssql_client::Ready> = self;
        client.execute(sql, &[]).await
    }
}

impl SqlExecutor for Client<InTransaction> {
    async fn execute_sql(&mut self, sql: &str) -> std::result::Result<u64, mssql_client::Error> {
        self.execute(sql, &[]).await
    }
}

/// The host's opaque row identity: a scalar for single-column primary
/// keys, a struct for composite ones.
#[derive(Debug, Clone, PartialEq)]
pub enum RowId {
    /// Single-column primary key value.
    Scalar(SqlValue),
    /// Composite primary key, one value per key column, in column order.
    Composite(Vec<SqlValue>),
}

impl RowId {
    /// The values making up this row id, in column order.
    pub fn values(&self) -> Vec<SqlValue> {
        match self {
            RowId::Scalar(v) => vec![v.clone()],
            RowId::Composite(vs) => vs.clone(),
        }
    }
}

/// Compute the effective batch size: the configured batch size, capped so
/// `effective * params_per_row <= max_parameters`.
///
/// Pure and unit-tested directly against the formula; used by every DML
/// executor to decide how many rows to accumulate before flushing.
pub fn effective_batch_size(configured: usize, max_parameters: usize, params_per_row: usize) -> usize {
    if params_per_row == 0 {
        return configured;
    }
    configured.min(max_parameters / params_per_row).max(1)
}

/// Running result of a DML operation across however many batches it took.
#[derive(Debug, Clone, Default)]
pub struct DmlResult {
    /// Total rows affected across all batches, accumulated from each
    /// batch's `DONE_COUNT`.
    pub rows_affected: u64,
    /// Number of batches executed.
    pub batches_executed: u32,
}

/// Accumulates row batches while the connection they'd otherwise run
/// against is busy driving a scan inside the same host transaction.
///
/// Per the deferred-execution rule: when a connection is pinned and also
/// feeding a scan, DML batches cannot interleave with the scan's reads,
/// so they are buffered here and flushed sequentially at `Finalize`.
#[derive(Debug, Default)]
pub struct DeferredBuffer {
    batches: Vec<Vec<Vec<SqlValue>>>,
}

impl DeferredBuffer {
    /// Create an empty deferred buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer one batch of rows (each row a `Vec<SqlValue>` in column
    /// order) for later flushing.
    pub fn push_batch(&mut self, rows: Vec<Vec<SqlValue>>) {
        self.batches.push(rows);
    }

    /// Number of batches currently buffered.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Whether no batches are buffered.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Drain the buffered batches in the order they were pushed.
    pub fn drain(&mut self) -> Vec<Vec<Vec<SqlValue>>> {
        std::mem::take(&mut self.batches)
    }
}

fn values_clause(rows: &[Vec<SqlValue>]) -> String {
    rows.iter()
        .map(|row| {
            let items: Vec<String> = row.iter().map(crate::pushdown::sql_literal).collect();
            format!("({})", items.join(", "))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Batches `INSERT` statements for a target table.
///
/// Generates `INSERT INTO [schema].[table] (cols) [OUTPUT INSERTED.(cols)]
/// VALUES (...), (...);` batches, flushing when either the row-count or
/// SQL-byte-size limit is exceeded. Identity columns are never included
/// (MVP does not support `SET IDENTITY_INSERT ON`).
pub struct InsertBatcher {
    schema: String,
    table: String,
    columns: Vec<String>,
    identity_columns: Vec<String>,
    returning: Option<Vec<String>>,
    batch_size: usize,
    max_sql_bytes: usize,
    pending: Vec<Vec<SqlValue>>,
    result: DmlResult,
}

impl InsertBatcher {
    /// Create a new batcher. Returns an error if any of `columns` is
    /// listed in `identity_columns`.
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        columns: Vec<String>,
        identity_columns: Vec<String>,
        batch_size: usize,
        max_sql_bytes: usize,
    ) -> Result<Self> {
        let table = table.into();
        for column in &columns {
            if identity_columns.contains(column) {
                return Err(CatalogError::DmlIdentityColumn {
                    table: table.clone(),
                    column: column.clone(),
                });
            }
        }
        Ok(Self {
            schema: schema.into(),
            table,
            columns,
            identity_columns,
            returning: None,
            batch_size,
            max_sql_bytes,
            pending: Vec::new(),
            result: DmlResult::default(),
        })
    }

    /// Request `OUTPUT INSERTED.(cols)` on every flushed batch.
    pub fn with_returning(mut self, columns: Vec<String>) -> Self {
        self.returning = Some(columns);
        self
    }

    /// Buffer one row. Flushes automatically once the configured limits
    /// are reached.
    pub async fn add_row<E: SqlExecutor>(&mut self, client: &mut E, row: Vec<SqlValue>) -> Result<()> {
        self.pending.push(row);
        if self.should_flush() {
            self.flush(client).await?;
        }
        Ok(())
    }

    fn should_flush(&self) -> bool {
        if self.pending.len() >= self.batch_size {
            return true;
        }
        self.estimated_sql_bytes() >= self.max_sql_bytes
    }

    fn estimated_sql_bytes(&self) -> usize {
        // Cheap estimate: each row contributes roughly its literal-text
        // width; good enough to trigger a flush before the real
        // generated SQL would exceed the limit.
        self.pending
            .iter()
            .map(|row| row.iter().map(|v| format!("{v:?}").len() + 2).sum::<usize>())
            .sum()
    }

    fn build_statement(&self, rows: &[Vec<SqlValue>]) -> String {
        let cols = self
            .columns
            .iter()
            .map(|c| bracket_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");

        let output = self.returning.as_ref().map(|cols| {
            let items = cols
                .iter()
                .map(|c| format!("INSERTED.{}", bracket_identifier(c)))
                .collect::<Vec<_>>()
                .join(", ");
            format!(" OUTPUT {items}")
        });

        format!(
            "INSERT INTO {}.{} ({}){} VALUES {};",
            bracket_identifier(&self.schema),
            bracket_identifier(&self.table),
            cols,
            output.unwrap_or_default(),
            values_clause(rows)
        )
    }

    /// Flush any buffered rows as one batch.
    pub async fn flush<E: SqlExecutor>(&mut self, client: &mut E) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let rows = std::mem::take(&mut self.pending);
        let sql = self.build_statement(&rows);
        let batch_index = self.result.batches_executed as usize;

        let rows_affected = client
            .execute_sql(&sql)
            .await
            .map_err(|err| wrap_batch_error(err, "DML INSERT", &self.table, batch_index))?;

        self.result.rows_affected += rows_affected;
        self.result.batches_executed += 1;
        Ok(())
    }

    /// Flush any remaining rows and return the accumulated result.
    pub async fn finalize<E: SqlExecutor>(mut self, client: &mut E) -> Result<DmlResult> {
        self.flush(client).await?;
        Ok(self.result)
    }
}

/// Batches `UPDATE`/`DELETE` statements keyed by row id.
///
/// `updated_cols` is empty for a delete batcher (params-per-row is just
/// the PK column count); for update it's the SET-list length.
pub struct KeyedBatcher {
    schema: String,
    table: String,
    is_delete: bool,
    set_columns: Vec<String>,
    pk_columns: Vec<String>,
    batch_size: usize,
    pending_rows: Vec<(RowId, Vec<SqlValue>)>,
    result: DmlResult,
}

impl KeyedBatcher {
    /// Create a batcher for `UPDATE` (non-empty `set_columns`) or
    /// `DELETE` (empty `set_columns`).
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        set_columns: Vec<String>,
        pk_columns: Vec<String>,
        configured_batch_size: usize,
        max_parameters: usize,
    ) -> Self {
        let is_delete = set_columns.is_empty();
        let params_per_row = if is_delete {
            pk_columns.len()
        } else {
            set_columns.len() + pk_columns.len()
        };
        let batch_size = effective_batch_size(configured_batch_size, max_parameters, params_per_row);
        Self {
            schema: schema.into(),
            table: table.into(),
            is_delete,
            set_columns,
            pk_columns,
            batch_size,
            pending_rows: Vec::new(),
            result: DmlResult::default(),
        }
    }

    /// The batch size this batcher settled on after applying the
    /// `max_parameters` cap.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size
    }

    fn where_clause_for(&self, row_id: &RowId) -> String {
        let values = row_id.values();
        self.pk_columns
            .iter()
            .zip(values.iter())
            .map(|(col, value)| {
                format!(
                    "{} = {}",
                    bracket_identifier(col),
                    crate::pushdown::sql_literal(value)
                )
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    fn build_statement(&self, rows: &[(RowId, Vec<SqlValue>)]) -> String {
        let target = format!(
            "{}.{}",
            bracket_identifier(&self.schema),
            bracket_identifier(&self.table)
        );

        rows.iter()
            .map(|(row_id, values)| {
                let predicate = self.where_clause_for(row_id);
                if self.is_delete {
                    format!("DELETE FROM {target} WHERE {predicate};")
                } else {
                    let set_list = self
                        .set_columns
                        .iter()
                        .zip(values.iter())
                        .map(|(col, value)| {
                            format!(
                                "{} = {}",
                                bracket_identifier(col),
                                crate::pushdown::sql_literal(value)
                            )
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("UPDATE {target} SET {set_list} WHERE {predicate};")
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Buffer one row keyed by `row_id`; `values` is the SET list in
    /// column order (empty for delete). Flushes automatically at the
    /// batch-size boundary.
    pub async fn add_row<E: SqlExecutor>(
        &mut self,
        client: &mut E,
        row_id: RowId,
        values: Vec<SqlValue>,
    ) -> Result<()> {
        self.pending_rows.push((row_id, values));
        if self.pending_rows.len() >= self.batch_size {
            self.flush(client).await?;
        }
        Ok(())
    }

    /// Flush any buffered rows as one batch.
    pub async fn flush<E: SqlExecutor>(&mut self, client: &mut E) -> Result<()> {
        if self.pending_rows.is_empty() {
            return Ok(());
        }
        let rows = std::mem::take(&mut self.pending_rows);
        let sql = self.build_statement(&rows);
        let batch_index = self.result.batches_executed as usize;
        let label = if self.is_delete { "DML DELETE" } else { "DML UPDATE" };

        let rows_affected = client
            .execute_sql(&sql)
            .await
            .map_err(|err| wrap_batch_error(err, label, &self.table, batch_index))?;

        self.result.rows_affected += rows_affected;
        self.result.batches_executed += 1;
        Ok(())
    }

    /// Flush any remaining rows and return the accumulated result.
    pub async fn finalize<E: SqlExecutor>(mut self, client: &mut E) -> Result<DmlResult> {
        self.flush(client).await?;
        Ok(self.result)
    }
}

fn wrap_batch_error(
    err: mssql_client::Error,
    operation: &'static str,
    target: &str,
    batch_index: usize,
) -> CatalogError {
    if let mssql_client::Error::Server {
        number,
        state,
        message,
        ..
    } = &err
    {
        CatalogError::Query {
            operation,
            target: target.to_string(),
            batch_index,
            number: *number,
            state: *state,
            message: message.clone(),
        }
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_batch_size_caps_on_max_parameters() {
        // 2000 max_parameters / 10 params_per_row = 200 rows, below the
        // configured 500.
        assert_eq!(effective_batch_size(500, 2000, 10), 200);
    }

    #[test]
    fn effective_batch_size_respects_configured_when_smaller() {
        assert_eq!(effective_batch_size(50, 2000, 10), 50);
    }

    #[test]
    fn effective_batch_size_never_zero() {
        assert_eq!(effective_batch_size(500, 10, 100), 1);
    }

    #[test]
    fn row_id_scalar_and_composite_values() {
        assert_eq!(RowId::Scalar(SqlValue::Int(1)).values(), vec![SqlValue::Int(1)]);
        assert_eq!(
            RowId::Composite(vec![SqlValue::Int(1), SqlValue::Int(2)]).values(),
            vec![SqlValue::Int(1), SqlValue::Int(2)]
        );
    }

    #[test]
    fn insert_batcher_rejects_identity_column() {
        let result = InsertBatcher::new(
            "dbo",
            "t",
            vec!["id".into(), "name".into()],
            vec!["id".into()],
            500,
            8 * 1024 * 1024,
        );
        assert!(matches!(result, Err(CatalogError::DmlIdentityColumn { .. })));
    }

    #[test]
    fn deferred_buffer_drains_in_order() {
        let mut buffer = DeferredBuffer::new();
        buffer.push_batch(vec![vec![SqlValue::Int(1)]]);
        buffer.push_batch(vec![vec![SqlValue::Int(2)]]);
        assert_eq!(buffer.len(), 2);
        let drained = buffer.drain();
        assert_eq!(drained.len(), 2);
        assert!(buffer.is_empty());
    }

    #[test]
    fn keyed_batcher_builds_delete_statement() {
        let batcher = KeyedBatcher::new("dbo", "users", vec![], vec!["id".into()], 500, 2000);
        let sql = batcher.build_statement(&[(RowId::Scalar(SqlValue::Int(7)), vec![])]);
        assert_eq!(sql, "DELETE FROM [dbo].[users] WHERE [id] = 7;");
    }

    #[test]
    fn keyed_batcher_builds_update_statement() {
        let batcher = KeyedBatcher::new(
            "dbo",
            "users",
            vec!["name".into()],
            vec!["id".into()],
            500,
            2000,
        );
        let sql = batcher.build_statement(&[(
            RowId::Scalar(SqlValue::Int(7)),
            vec![SqlValue::String("Alice".into())],
        )]);
        assert_eq!(
            sql,
            "UPDATE [dbo].[users] SET [name] = N'Alice' WHERE [id] = 7;"
        );
    }
}
