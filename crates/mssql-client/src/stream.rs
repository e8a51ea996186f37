//! Streaming query result support.
//!
//! This module provides streaming result sets for memory-efficient
//! processing of large query results.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::Stream;
use tds_protocol::token::{ColMetaData, RawRow, Token, TokenParser};

use crate::error::Error;
use crate::row::{Column, Row};

/// A single result set: its column metadata and all of its rows.
///
/// Used by [`MultiResultStream`] to hold the result sets of a batch that
/// produces more than one, since they are parsed eagerly before the stream
/// is handed back to the caller.
#[derive(Debug, Clone)]
pub struct ResultSet {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl ResultSet {
    /// Create a new result set from its columns and rows.
    pub fn new(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Get the column metadata for this result set.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Get the rows of this result set.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows in this result set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether this result set has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A streaming result set from a query.
///
/// This stream yields rows one at a time, allowing processing of
/// large result sets without loading everything into memory.
///
/// # Example
///
/// ```rust,ignore
/// use futures::StreamExt;
///
/// let mut stream = client.query_stream("SELECT * FROM large_table").await?;
///
/// while let Some(row) = stream.next().await {
///     let row = row?;
///     process_row(&row);
/// }
/// ```
pub struct QueryStream<'a> {
    /// Column metadata for the result set.
    columns: Vec<Column>,
    /// Buffered rows, consumed front-to-back as the stream is polled.
    rows: std::collections::VecDeque<Row>,
    /// Lifetime tied to the connection.
    _marker: std::marker::PhantomData<&'a ()>,
}

impl<'a> QueryStream<'a> {
    /// Create a new query stream over an already-decoded result set.
    pub(crate) fn new(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows: rows.into(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Get the column metadata for this result set.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Check if the stream has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.rows.is_empty()
    }

    /// Collect all remaining rows into a vector.
    ///
    /// This consumes the stream and loads all rows into memory.
    /// For large result sets, consider iterating with the stream instead.
    pub async fn collect_all(self) -> Result<Vec<Row>, Error> {
        Ok(self.rows.into_iter().collect())
    }
}

impl Stream for QueryStream<'_> {
    type Item = Result<Row, Error>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Poll::Ready(this.rows.pop_front().map(Ok))
    }
}

/// Result of a non-query execution.
///
/// Contains the number of affected rows and any output parameters.
#[derive(Debug, Clone)]
pub struct ExecuteResult {
    /// Number of rows affected by the statement.
    pub rows_affected: u64,
    /// Output parameters from stored procedures.
    pub output_params: Vec<OutputParam>,
}

/// An output parameter from a stored procedure call.
#[derive(Debug, Clone)]
pub struct OutputParam {
    /// Parameter name.
    pub name: String,
    /// Parameter value.
    pub value: mssql_types::SqlValue,
}

impl ExecuteResult {
    /// Create a new execute result.
    pub fn new(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            output_params: Vec::new(),
        }
    }

    /// Create a result with output parameters.
    pub fn with_outputs(rows_affected: u64, output_params: Vec<OutputParam>) -> Self {
        Self {
            rows_affected,
            output_params,
        }
    }

    /// Get an output parameter by name.
    #[must_use]
    pub fn get_output(&self, name: &str) -> Option<&OutputParam> {
        self.output_params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// Multiple result sets from a batch or stored procedure.
///
/// Some queries return multiple result sets (e.g., stored procedures
/// with multiple SELECT statements). Unlike [`ScanStream`], encountering
/// more than one result set here is expected and not an error.
pub struct MultiResultStream<'a> {
    /// All result sets from the batch, already decoded.
    result_sets: Vec<ResultSet>,
    /// Current result set index.
    current_result: usize,
    /// Row cursor within the current result set.
    current_row: usize,
    /// Lifetime tied to the connection.
    _marker: std::marker::PhantomData<&'a ()>,
}

impl<'a> MultiResultStream<'a> {
    /// Create a new multi-result stream over already-decoded result sets.
    pub(crate) fn new(result_sets: Vec<ResultSet>) -> Self {
        Self {
            result_sets,
            current_result: 0,
            current_row: 0,
            _marker: std::marker::PhantomData,
        }
    }

    /// Get the current result set index (0-based).
    #[must_use]
    pub fn current_result_index(&self) -> usize {
        self.current_result
    }

    /// Get the column metadata for the current result set, if any.
    #[must_use]
    pub fn columns(&self) -> Option<&[Column]> {
        self.result_sets.get(self.current_result).map(|r| r.columns())
    }

    /// Move to the next result set.
    ///
    /// Returns `true` if there is another result set, `false` if no more.
    pub async fn next_result(&mut self) -> Result<bool, Error> {
        if self.current_result + 1 < self.result_sets.len() {
            self.current_result += 1;
            self.current_row = 0;
            Ok(true)
        } else {
            // Advance past the end so a subsequent call stays false.
            self.current_result = self.result_sets.len();
            Ok(false)
        }
    }

    /// Get the next row from the current result set.
    pub async fn next_row(&mut self) -> Result<Option<Row>, Error> {
        let Some(result_set) = self.result_sets.get(self.current_result) else {
            return Ok(None);
        };

        let Some(row) = result_set.rows().get(self.current_row) else {
            return Ok(None);
        };

        self.current_row += 1;
        Ok(Some(row.clone()))
    }
}

/// Lifecycle state of a [`ScanStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Columns not yet resolved; waiting on the first COLMETADATA.
    Initializing,
    /// Rows are being produced.
    Streaming,
    /// The scan finished normally; the underlying connection is idle again.
    Complete,
    /// The scan failed (including the fatal multi-result-set case).
    Error,
}

/// A single-result-set stream used for table scans.
///
/// Unlike [`QueryStream`], a second COLMETADATA or a `Done` carrying the
/// `more` flag is fatal: it means the batch produced more than one result
/// set, which a scan cannot represent. `ScanStream` drains the remainder of
/// the already-buffered response and surfaces a clear error instead of
/// silently returning the wrong rows.
///
/// Tokens are parsed lazily, one at a time, out of the message buffer
/// received for the batch — rows are decoded on demand as the stream is
/// polled rather than eagerly materialized into a `Vec<Row>` up front.
pub struct ScanStream {
    parser: TokenParser,
    columns: Vec<Column>,
    metadata: Option<ColMetaData>,
    state: ScanState,
}

impl ScanStream {
    /// Parse the initial COLMETADATA out of a freshly-received batch
    /// response and move to the `Streaming` state.
    ///
    /// `payload` is the full message for the batch (see
    /// [`crate::client::Client::scan`]).
    pub(crate) fn initialize(payload: Bytes) -> Result<Self, Error> {
        let mut parser = TokenParser::new(payload);
        let mut columns: Vec<Column> = Vec::new();
        let mut metadata: Option<ColMetaData> = None;

        loop {
            let token = parser
                .next_token_with_metadata(metadata.as_ref())
                .map_err(|e| Error::Protocol(e.to_string()))?;

            let Some(token) = token else {
                // Ran out of bytes before seeing either a ColMetaData or an
                // error: an empty batch (e.g. a statement with no SELECT).
                return Ok(Self {
                    parser,
                    columns,
                    metadata,
                    state: ScanState::Complete,
                });
            };

            match token {
                Token::ColMetaData(meta) => {
                    columns = Self::columns_from_metadata(&meta);
                    metadata = Some(meta);
                    break;
                }
                Token::Error(err) => return Err(Self::server_error(err)),
                Token::Done(done) if !done.status.more => {
                    return Ok(Self {
                        parser,
                        columns,
                        metadata,
                        state: ScanState::Complete,
                    });
                }
                _ => continue,
            }
        }

        Ok(Self {
            parser,
            columns,
            metadata,
            state: ScanState::Streaming,
        })
    }

    fn columns_from_metadata(meta: &ColMetaData) -> Vec<Column> {
        meta.columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let type_name = format!("{:?}", col.type_id);
                let mut column =
                    Column::new(&col.name, i, type_name).with_nullable(col.flags & 0x01 != 0);

                if let Some(max_len) = col.type_info.max_length {
                    column = column.with_max_length(max_len);
                }
                if let (Some(prec), Some(scale)) = (col.type_info.precision, col.type_info.scale)
                {
                    column = column.with_precision_scale(prec, scale);
                }
                if let Some(collation) = col.type_info.collation {
                    column = column.with_collation(collation);
                }
                column
            })
            .collect()
    }

    fn server_error(err: tds_protocol::token::ServerError) -> Error {
        Error::Server {
            number: err.number,
            state: err.state,
            class: err.class,
            message: err.message.clone(),
            server: if err.server.is_empty() {
                None
            } else {
                Some(err.server.clone())
            },
            procedure: if err.procedure.is_empty() {
                None
            } else {
                Some(err.procedure.clone())
            },
            line: err.line as u32,
        }
    }

    fn convert_row(&self, raw: &RawRow) -> Result<Row, Error> {
        let meta = self
            .metadata
            .as_ref()
            .expect("ScanStream always resolves metadata before Streaming");

        let mut values = Vec::with_capacity(meta.columns.len());
        let mut buf = raw.data.as_ref();
        for col in &meta.columns {
            let value = crate::client::Client::<crate::state::Ready>::parse_column_value(
                &mut buf, col,
            )?;
            values.push(value);
        }
        Ok(Row::from_values(self.columns.clone(), values))
    }

    /// Drain the rest of the buffered response without decoding rows,
    /// discarding any further tokens (used once a scan has failed fatally).
    fn drain(&mut self) {
        loop {
            match self.parser.next_token_with_metadata(self.metadata.as_ref()) {
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => break,
            }
        }
    }

    /// Get the column metadata for this scan.
    ///
    /// Empty until the stream has left the `Initializing` state.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Whether the scan has finished (successfully or with an error).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.state, ScanState::Complete | ScanState::Error)
    }

    fn poll_token(&mut self) -> Option<Result<Row, Error>> {
        if self.state != ScanState::Streaming {
            return None;
        }

        loop {
            let token = match self.parser.next_token_with_metadata(self.metadata.as_ref()) {
                Ok(Some(token)) => token,
                Ok(None) => {
                    // Ran out of bytes without a terminal Done: treat the
                    // connection's response as complete.
                    self.state = ScanState::Complete;
                    return None;
                }
                Err(e) => {
                    self.state = ScanState::Error;
                    return Some(Err(Error::Protocol(e.to_string())));
                }
            };

            match token {
                Token::Row(raw) => {
                    let row = self.convert_row(&raw);
                    return Some(row);
                }
                Token::NbcRow(_) => {
                    // NbcRow decoding shares the same column walk as Row once
                    // nulls are filled in; reuse the same path via RawRow is
                    // not applicable here, so fall through to a protocol
                    // error rather than silently skip the row.
                    self.state = ScanState::Error;
                    self.drain();
                    return Some(Err(Error::Protocol(
                        "NBCROW decoding is not supported by ScanStream".to_string(),
                    )));
                }
                Token::ColMetaData(_) => {
                    // Second COLMETADATA: fatal per the scan contract.
                    self.state = ScanState::Error;
                    self.drain();
                    return Some(Err(Error::Protocol(
                        "batch produced multiple result sets".to_string(),
                    )));
                }
                Token::Done(done) => {
                    if done.status.error {
                        self.state = ScanState::Error;
                        return Some(Err(Error::Query("query failed".to_string())));
                    }
                    if done.status.more {
                        // Multi-result-set: fatal per the scan contract.
                        self.state = ScanState::Error;
                        self.drain();
                        return Some(Err(Error::Protocol(
                            "batch produced multiple result sets".to_string(),
                        )));
                    }
                    self.state = ScanState::Complete;
                    return None;
                }
                Token::DoneProc(done) | Token::DoneInProc(done) => {
                    if done.status.error {
                        self.state = ScanState::Error;
                        return Some(Err(Error::Query("query failed".to_string())));
                    }
                    continue;
                }
                Token::Error(err) => {
                    self.state = ScanState::Error;
                    return Some(Err(Self::server_error(err)));
                }
                _ => continue,
            }
        }
    }
}

impl Stream for ScanStream {
    type Item = Result<Row, Error>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.get_mut().poll_token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_result() {
        let result = ExecuteResult::new(42);
        assert_eq!(result.rows_affected, 42);
        assert!(result.output_params.is_empty());
    }

    #[test]
    fn test_execute_result_with_outputs() {
        let outputs = vec![OutputParam {
            name: "ReturnValue".to_string(),
            value: mssql_types::SqlValue::Int(100),
        }];

        let result = ExecuteResult::with_outputs(10, outputs);
        assert_eq!(result.rows_affected, 10);
        assert!(result.get_output("ReturnValue").is_some());
        assert!(result.get_output("returnvalue").is_some()); // case-insensitive
        assert!(result.get_output("NotFound").is_none());
    }

    fn sample_column() -> Column {
        Column::new("id", 0, "INT")
            .with_nullable(false)
            .with_max_length(4)
            .with_precision_scale(0, 0)
    }

    #[test]
    fn test_query_stream_columns() {
        let columns = vec![sample_column()];
        let stream = QueryStream::new(columns, Vec::new());
        assert_eq!(stream.columns().len(), 1);
        assert_eq!(stream.columns()[0].name, "id");
        assert!(stream.is_finished());
    }

    #[tokio::test]
    async fn query_stream_collects_buffered_rows() {
        let columns = vec![sample_column()];
        let rows = vec![
            Row::from_values(columns.clone(), vec![mssql_types::SqlValue::Int(1)]),
            Row::from_values(columns.clone(), vec![mssql_types::SqlValue::Int(2)]),
        ];
        let stream = QueryStream::new(columns, rows);
        assert!(!stream.is_finished());
        let collected = stream.collect_all().await.unwrap();
        assert_eq!(collected.len(), 2);
    }

    #[tokio::test]
    async fn multi_result_stream_walks_result_sets_in_order() {
        let columns = vec![sample_column()];
        let rs1 = ResultSet::new(
            columns.clone(),
            vec![Row::from_values(
                columns.clone(),
                vec![mssql_types::SqlValue::Int(1)],
            )],
        );
        let rs2 = ResultSet::new(
            columns.clone(),
            vec![Row::from_values(columns.clone(), vec![mssql_types::SqlValue::Int(2)])],
        );

        let mut stream = MultiResultStream::new(vec![rs1, rs2]);
        assert_eq!(stream.current_result_index(), 0);
        assert!(stream.next_row().await.unwrap().is_some());
        assert!(stream.next_row().await.unwrap().is_none());
        assert!(stream.next_result().await.unwrap());
        assert_eq!(stream.current_result_index(), 1);
        assert!(stream.next_row().await.unwrap().is_some());
        assert!(!stream.next_result().await.unwrap());
    }
}
