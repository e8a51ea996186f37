//! Catalog-level runtime knobs (§6 environment inputs).

use std::time::Duration;

/// Runtime configuration for a [`crate::Catalog`].
///
/// Marked `#[non_exhaustive]`: construct via [`CatalogConfig::new`] plus
/// the builder methods, or [`Default::default()`].
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CatalogConfig {
    /// Default batch size for DML executors (rows per round-trip).
    pub batch_size_dml: usize,

    /// Maximum bound parameters per SQL batch (SQL Server supports ~2100).
    pub max_parameters: usize,

    /// Target batch size for INSERT, before the SQL byte-size limit.
    pub insert_batch_size: usize,

    /// Maximum SQL text size for a single generated INSERT batch.
    pub insert_max_sql_bytes: usize,

    /// Rows per BCP batch.
    pub copy_batch_rows: usize,

    /// Maximum bytes buffered per BCP batch before a flush.
    pub copy_max_batch_bytes: usize,

    /// Per-query timeout; `Duration::ZERO` means infinite.
    pub query_timeout: Duration,

    /// Timeout waiting for a pooled connection.
    pub acquire_timeout: Duration,

    /// Idle timeout before a pooled connection is discarded.
    pub idle_timeout: Duration,

    /// Timeout establishing a new connection.
    pub connection_timeout: Duration,

    /// Time-to-live for cached table/schema metadata.
    pub catalog_cache_ttl: Duration,

    /// Whether ORDER BY pushdown is attempted at all.
    pub order_pushdown: bool,

    /// Verbosity of internal statistics logging (0..2).
    pub statistics_level: u8,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            batch_size_dml: 500,
            max_parameters: 2000,
            insert_batch_size: 2000,
            insert_max_sql_bytes: 8 * 1024 * 1024,
            copy_batch_rows: 10_000,
            copy_max_batch_bytes: 32 * 1024 * 1024,
            query_timeout: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(300),
            connection_timeout: Duration::from_secs(30),
            catalog_cache_ttl: Duration::from_secs(300),
            order_pushdown: true,
            statistics_level: 0,
        }
    }
}

impl CatalogConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default DML batch size.
    #[must_use]
    pub fn batch_size_dml(mut self, rows: usize) -> Self {
        self.batch_size_dml = rows;
        self
    }

    /// Set the maximum bound parameters per batch.
    #[must_use]
    pub fn max_parameters(mut self, max: usize) -> Self {
        self.max_parameters = max;
        self
    }

    /// Set the target INSERT batch size.
    #[must_use]
    pub fn insert_batch_size(mut self, rows: usize) -> Self {
        self.insert_batch_size = rows;
        self
    }

    /// Set the maximum generated SQL size for an INSERT batch.
    #[must_use]
    pub fn insert_max_sql_bytes(mut self, bytes: usize) -> Self {
        self.insert_max_sql_bytes = bytes;
        self
    }

    /// Set the BCP rows-per-batch target.
    #[must_use]
    pub fn copy_batch_rows(mut self, rows: usize) -> Self {
        self.copy_batch_rows = rows;
        self
    }

    /// Set the BCP max buffered bytes per batch.
    #[must_use]
    pub fn copy_max_batch_bytes(mut self, bytes: usize) -> Self {
        self.copy_max_batch_bytes = bytes;
        self
    }

    /// Set the per-query timeout. Zero means infinite.
    #[must_use]
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Set the pool acquire timeout.
    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set the pool idle timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the new-connection timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the metadata cache TTL.
    #[must_use]
    pub fn catalog_cache_ttl(mut self, ttl: Duration) -> Self {
        self.catalog_cache_ttl = ttl;
        self
    }

    /// Enable or disable ORDER BY pushdown.
    #[must_use]
    pub fn order_pushdown(mut self, enabled: bool) -> Self {
        self.order_pushdown = enabled;
        self
    }

    /// Set the statistics logging verbosity (0..2).
    #[must_use]
    pub fn statistics_level(mut self, level: u8) -> Self {
        self.statistics_level = level;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = CatalogConfig::default();
        assert_eq!(config.batch_size_dml, 500);
        assert_eq!(config.max_parameters, 2000);
        assert_eq!(config.insert_batch_size, 2000);
        assert_eq!(config.insert_max_sql_bytes, 8 * 1024 * 1024);
        assert_eq!(config.copy_batch_rows, 10_000);
        assert_eq!(config.copy_max_batch_bytes, 32 * 1024 * 1024);
        assert!(config.order_pushdown);
        assert_eq!(config.statistics_level, 0);
    }

    #[test]
    fn builder_methods_apply() {
        let config = CatalogConfig::new()
            .batch_size_dml(100)
            .max_parameters(1000)
            .order_pushdown(false)
            .statistics_level(2);

        assert_eq!(config.batch_size_dml, 100);
        assert_eq!(config.max_parameters, 1000);
        assert!(!config.order_pushdown);
        assert_eq!(config.statistics_level, 2);
    }
}
