//! Per-catalog metadata cache.
//!
//! Keyed by `(catalog, schema, object_name)`, each entry moves through
//! `Empty -> Loading -> Ready -> Stale -> Loading` as it's first
//! populated, served, and eventually invalidated by DDL or
//! `RefreshMetadata`.

use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

use crate::error::Result;

/// Key identifying one table/view's cached metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetadataKey {
    /// Catalog (database) name.
    pub catalog: String,
    /// Schema name.
    pub schema: String,
    /// Table or view name.
    pub object_name: String,
}

impl MetadataKey {
    /// Build a key from its three parts.
    pub fn new(catalog: impl Into<String>, schema: impl Into<String>, object_name: impl Into<String>) -> Self {
        Self {
            catalog: catalog.into(),
            schema: schema.into(),
            object_name: object_name.into(),
        }
    }
}

/// Column metadata as reported by `sys.columns`/`INFORMATION_SCHEMA`.
#[derive(Debug, Clone)]
pub struct ColumnMetadata {
    /// Column name.
    pub name: String,
    /// SQL Server type name (e.g. `"NVARCHAR"`).
    pub sql_type: String,
    /// Whether the column allows NULL.
    pub nullable: bool,
    /// Whether the column is an IDENTITY column.
    pub is_identity: bool,
    /// Ordinal position (0-based).
    pub ordinal: usize,
}

/// Cached shape of one table/view: its columns and primary key.
#[derive(Debug, Clone, Default)]
pub struct TableMetadata {
    /// Columns in ordinal order.
    pub columns: Vec<ColumnMetadata>,
    /// Primary key column names, in key order (empty if none).
    pub primary_key: Vec<String>,
}

struct Entry {
    metadata: TableMetadata,
    loaded_at: Instant,
}

/// Loads and caches [`TableMetadata`], with a TTL-based staleness check.
///
/// Entries don't literally track `Empty`/`Loading` as distinct states —
/// those describe the absence of an entry and the in-flight `loader`
/// call respectively; `Ready`/`Stale` is the TTL check against
/// `loaded_at`.
pub struct MetadataCache {
    entries: Mutex<LruCache<MetadataKey, Entry>>,
    ttl: Duration,
}

impl MetadataCache {
    /// Create a cache holding up to `capacity` tables, each entry valid
    /// for `ttl` before being considered stale.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = std::num::NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Fetch cached metadata for `key`, or run `loader` to populate it
    /// when absent or stale.
    pub async fn get_or_load<F, Fut>(&self, key: &MetadataKey, loader: F) -> Result<TableMetadata>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<TableMetadata>>,
    {
        if let Some(metadata) = self.peek_fresh(key) {
            return Ok(metadata);
        }

        let metadata = loader().await?;
        self.entries.lock().put(
            key.clone(),
            Entry {
                metadata: metadata.clone(),
                loaded_at: Instant::now(),
            },
        );
        Ok(metadata)
    }

    fn peek_fresh(&self, key: &MetadataKey) -> Option<TableMetadata> {
        let mut entries = self.entries.lock();
        let entry = entries.get(key)?;
        if entry.loaded_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.metadata.clone())
    }

    /// Invalidate one entry (called after DDL against that object).
    pub fn invalidate(&self, key: &MetadataKey) {
        self.entries.lock().pop(key);
    }

    /// Invalidate every entry (`RefreshMetadata` on the whole catalog).
    pub fn invalidate_all(&self) {
        self.entries.lock().clear();
    }

    /// Number of entries currently cached (stale or fresh).
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> TableMetadata {
        TableMetadata {
            columns: vec![ColumnMetadata {
                name: "id".into(),
                sql_type: "INT".into(),
                nullable: false,
                is_identity: true,
                ordinal: 0,
            }],
            primary_key: vec!["id".into()],
        }
    }

    #[tokio::test]
    async fn loader_runs_once_for_repeated_fresh_lookups() {
        let cache = MetadataCache::new(8, Duration::from_secs(300));
        let key = MetadataKey::new("db", "dbo", "t");
        let calls = std::sync::atomic::AtomicUsize::new(0);

        for _ in 0..3 {
            cache
                .get_or_load(&key, || {
                    calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    async { Ok(sample_metadata()) }
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_entry_triggers_reload() {
        let cache = MetadataCache::new(8, Duration::from_millis(1));
        let key = MetadataKey::new("db", "dbo", "t");

        cache
            .get_or_load(&key, || async { Ok(sample_metadata()) })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;

        let calls = std::sync::atomic::AtomicUsize::new(0);
        cache
            .get_or_load(&key, || {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async { Ok(sample_metadata()) }
            })
            .await
            .unwrap();

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let cache = MetadataCache::new(8, Duration::from_secs(300));
        let key = MetadataKey::new("db", "dbo", "t");

        cache
            .get_or_load(&key, || async { Ok(sample_metadata()) })
            .await
            .unwrap();
        cache.invalidate(&key);
        assert!(cache.is_empty());
    }
}
