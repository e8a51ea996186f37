//! Catalog error taxonomy.

use thiserror::Error;

/// Errors surfaced by the catalog adapter.
///
/// Variants wrap lower-layer errors rather than flattening them, so the
/// originating layer (client, pool) stays identifiable in `{source}`
/// chains, per the propagation policy: local query errors stay on the
/// operation, transport/protocol errors evict the connection.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// TCP connect failure, TLS handshake failure, read/write timeout, or
    /// unexpected EOF. Usually retriable with a fresh connection.
    #[error("MSSQL transport error: {0}")]
    Transport(#[source] mssql_client::Error),

    /// Malformed packet, unexpected token, or a second COLMETADATA during
    /// streaming. Fatal for the current connection.
    #[error("MSSQL protocol error: {0}")]
    Protocol(String),

    /// Bad credentials, expired token, or an encryption requirement the
    /// client didn't offer.
    #[error("MSSQL authentication error: {0}")]
    Authentication(#[source] mssql_client::Error),

    /// A server ERROR token inside a batch. The connection remains usable
    /// after the DONE token drains.
    #[error("MSSQL {operation} error on {target}: batch {batch_index} failed ({number}, state {state}): {message}")]
    Query {
        /// Subsystem label, e.g. "DML", "DDL", "scan".
        operation: &'static str,
        /// `schema.table` or similar target identifier.
        target: String,
        /// Index of the batch that failed, within a multi-batch operation.
        batch_index: usize,
        /// SQL Server error number.
        number: u32,
        /// SQL Server error state.
        state: u8,
        /// Server-provided error message.
        message: String,
    },

    /// A query exceeded `query_timeout` and was canceled via ATTENTION.
    #[error("MSSQL query timed out after {seconds}s; raise query_timeout_seconds if this is expected")]
    QueryTimeout {
        /// The timeout that was exceeded.
        seconds: u64,
    },

    /// The pool could not hand out a connection within `acquire_timeout`.
    #[error("MSSQL connection pool exhausted: {0}")]
    Resource(#[source] mssql_driver_pool::PoolError),

    /// Unsupported column type, DML against an identity column,
    /// unsupported DDL, or a write attempted on a read-only catalog.
    #[error("MSSQL configuration error: {0}")]
    Configuration(String),

    /// A column's SQL Server type has no supported host mapping.
    #[error("MSSQL {table}.{column}: unsupported column type {sql_type}")]
    UnsupportedColumnType {
        /// Table the column belongs to.
        table: String,
        /// Column name.
        column: String,
        /// SQL Server type name that has no mapping.
        sql_type: String,
    },

    /// A scan's batch produced more than one result set.
    #[error("MSSQL: the SQL batch produced multiple result sets")]
    MultiResultSetInScan,

    /// Scanning an attached table is forbidden while a host transaction
    /// has pinned the connection (MVP restriction; use a raw-SQL
    /// operation instead).
    #[error("MSSQL: scanning an attached table inside a host transaction is not supported")]
    ScanInsideTransactionForbidden,

    /// DML targeted an identity column, which MVP does not support
    /// writing to (no `SET IDENTITY_INSERT ON`).
    #[error("MSSQL DML error on {table}: identity column {column} is not writeable")]
    DmlIdentityColumn {
        /// Table being written to.
        table: String,
        /// Identity column name.
        column: String,
    },

    /// The requested DDL operation has no supported translation.
    #[error("MSSQL DDL error: unsupported operation: {0}")]
    UnsupportedDdl(String),

    /// A write was attempted against a catalog attached with
    /// [`crate::AccessMode::ReadOnly`].
    #[error("MSSQL: write attempted on read-only catalog {0}")]
    WriteOnReadOnlyCatalog(String),

    /// A filter tree's AND/OR nesting exceeded the pushdown encoder's
    /// recursion bound.
    #[error("MSSQL: filter tree exceeds maximum pushdown depth of {max}")]
    FilterPushdownDepthExceeded {
        /// The configured maximum depth.
        max: usize,
    },

    /// A connection string or URL could not be parsed.
    #[error("MSSQL: invalid connection string: {0}")]
    InvalidConnectionString(String),
}

impl From<mssql_client::Error> for CatalogError {
    fn from(err: mssql_client::Error) -> Self {
        use mssql_client::Error as E;
        match &err {
            E::Authentication(_) => CatalogError::Authentication(err),
            E::ConnectTimeout | E::ConnectionTimeout | E::CommandTimeout => {
                CatalogError::QueryTimeout { seconds: 0 }
            }
            _ => CatalogError::Transport(err),
        }
    }
}

impl From<mssql_driver_pool::PoolError> for CatalogError {
    fn from(err: mssql_driver_pool::PoolError) -> Self {
        CatalogError::Resource(err)
    }
}

/// Convenience alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
