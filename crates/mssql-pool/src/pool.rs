//! Connection pool implementation.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use mssql_client::{Client, Config as ClientConfig, Ready};
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::lifecycle::ConnectionMetadata;

/// A connection pool for SQL Server.
///
/// The pool manages a set of database connections, providing automatic
/// connection reuse, health checking, and lifecycle management. Capacity
/// is bounded by a [`Semaphore`] with one permit per connection slot: the
/// permit for a connection travels with it from creation, through idle
/// storage, to checkout, and is only released back to the semaphore when
/// the connection is discarded rather than returned.
///
/// Connections are created lazily: building a pool (via [`Pool::new`] or
/// [`Pool::builder`]) does not open any connections, it only reserves
/// capacity. The first `max_connections` calls to [`Pool::get`] each pay
/// the cost of a fresh connection; after that, connections are reused from
/// the idle list.
pub struct Pool {
    config: PoolConfig,
    inner: Arc<PoolInner>,
}

struct PoolInner {
    config: PoolConfig,
    client_config: ClientConfig,
    semaphore: Arc<Semaphore>,
    idle: Mutex<VecDeque<IdleEntry>>,
    next_id: AtomicU64,
    closed: Mutex<bool>,
    connections_created: AtomicU64,
    connections_closed: AtomicU64,
    checkouts_successful: AtomicU64,
    checkouts_failed: AtomicU64,
    health_checks_performed: AtomicU64,
    health_checks_failed: AtomicU64,
    resets_performed: AtomicU64,
    resets_failed: AtomicU64,
}

/// An idle connection plus the bookkeeping needed to decide whether it can
/// still be handed out, and the permit it has held since creation.
struct IdleEntry {
    client: Client<Ready>,
    metadata: ConnectionMetadata,
    permit: OwnedSemaphorePermit,
}

impl Pool {
    /// Create a new pool.
    ///
    /// `client_config` is used to open every connection the pool creates.
    /// No connections are established until the first [`Pool::get`] call.
    pub async fn new(config: PoolConfig, client_config: ClientConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let inner = Arc::new(PoolInner {
            semaphore: Arc::new(Semaphore::new(config.max_connections as usize)),
            client_config,
            idle: Mutex::new(VecDeque::with_capacity(config.max_connections as usize)),
            next_id: AtomicU64::new(1),
            closed: Mutex::new(false),
            connections_created: AtomicU64::new(0),
            connections_closed: AtomicU64::new(0),
            checkouts_successful: AtomicU64::new(0),
            checkouts_failed: AtomicU64::new(0),
            health_checks_performed: AtomicU64::new(0),
            health_checks_failed: AtomicU64::new(0),
            resets_performed: AtomicU64::new(0),
            resets_failed: AtomicU64::new(0),
            config: config.clone(),
        });

        Ok(Self { config, inner })
    }

    /// Start building a pool with a fluent API.
    #[must_use]
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Get a connection from the pool.
    ///
    /// This will either return an existing idle connection or create a new one
    /// if the pool is not at capacity. If all connections are in use and the
    /// pool is at capacity, this will wait until a connection becomes available
    /// or `connection_timeout` elapses.
    pub async fn get(&self) -> Result<PooledConnection, PoolError> {
        if self.is_closed() {
            return Err(PoolError::PoolClosed);
        }

        tracing::trace!("acquiring connection from pool");

        let acquire_timeout = self.inner.config.connection_timeout;
        let result = match timeout(acquire_timeout, self.inner.acquire()).await {
            Ok(result) => result,
            Err(_) => Err(PoolError::Timeout),
        };

        match &result {
            Ok(_) => {
                self.inner.checkouts_successful.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.inner.checkouts_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    /// Try to get an idle connection without waiting or creating a new one.
    ///
    /// Returns `Ok(None)` if the pool has no idle connection on hand right
    /// now. Never blocks and never opens a connection.
    pub fn try_get(&self) -> Result<Option<PooledConnection>, PoolError> {
        if self.is_closed() {
            return Err(PoolError::PoolClosed);
        }

        let result = self.inner.try_acquire();
        match &result {
            Ok(Some(_)) => {
                self.inner.checkouts_successful.fetch_add(1, Ordering::Relaxed);
            }
            Ok(None) => {}
            Err(_) => {
                self.inner.checkouts_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let idle = self.inner.idle.lock().len() as u32;
        let available_permits = self.inner.semaphore.available_permits() as u32;
        let max = self.config.max_connections;
        let total = max.saturating_sub(available_permits.min(max));
        PoolStatus {
            available: idle,
            in_use: total.saturating_sub(idle),
            total,
            max,
        }
    }

    /// Get a snapshot of the pool's lifetime metrics.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            connections_created: self.inner.connections_created.load(Ordering::Relaxed),
            connections_closed: self.inner.connections_closed.load(Ordering::Relaxed),
            checkouts_successful: self.inner.checkouts_successful.load(Ordering::Relaxed),
            checkouts_failed: self.inner.checkouts_failed.load(Ordering::Relaxed),
            health_checks_performed: self.inner.health_checks_performed.load(Ordering::Relaxed),
            health_checks_failed: self.inner.health_checks_failed.load(Ordering::Relaxed),
            resets_performed: self.inner.resets_performed.load(Ordering::Relaxed),
            resets_failed: self.inner.resets_failed.load(Ordering::Relaxed),
        }
    }

    /// Close the pool, dropping all idle connections.
    ///
    /// Connections currently checked out are returned (and discarded, since
    /// the pool is now closed) as their [`PooledConnection`] is dropped.
    pub async fn close(&self) {
        *self.inner.closed.lock() = true;
        let idle = std::mem::take(&mut *self.inner.idle.lock());
        self.inner
            .connections_closed
            .fetch_add(idle.len() as u64, Ordering::Relaxed);
        tracing::info!(dropped = idle.len(), "connection pool closed");
        drop(idle);
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.inner.closed.lock()
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl PoolInner {
    async fn connect(&self) -> Result<Client<Ready>, PoolError> {
        let client = Client::connect(self.client_config.clone())
            .await
            .map_err(|e| PoolError::ConnectionCreation(e.to_string()))?;
        self.connections_created.fetch_add(1, Ordering::Relaxed);
        Ok(client)
    }

    /// Core acquisition loop: try idle connections first (validating
    /// long-idle ones, discarding expired ones), falling back to creating
    /// a new connection once a permit is available.
    async fn acquire(self: &Arc<Self>) -> Result<PooledConnection, PoolError> {
        loop {
            let Some(entry) = self.idle.lock().pop_front() else {
                // No idle connection on hand: wait for a free slot and create one.
                let permit = Arc::clone(&self.semaphore)
                    .acquire_owned()
                    .await
                    .map_err(|_| PoolError::PoolClosed)?;
                let client = self.connect().await?;
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let mut metadata = ConnectionMetadata::new(id);
                metadata.mark_checkout();
                return Ok(PooledConnection {
                    pool: Arc::clone(self),
                    client: Some(client),
                    permit: Some(permit),
                    metadata,
                });
            };

            match self.validate_idle(entry).await {
                Some((client, mut metadata, permit)) => {
                    metadata.mark_checkout();
                    return Ok(PooledConnection {
                        pool: Arc::clone(self),
                        client: Some(client),
                        permit: Some(permit),
                        metadata,
                    });
                }
                None => continue,
            }
        }
    }

    /// Non-blocking counterpart to [`PoolInner::acquire`]: only looks at the
    /// idle list, never waits for a permit and never creates a connection.
    fn try_acquire(self: &Arc<Self>) -> Result<Option<PooledConnection>, PoolError> {
        loop {
            let Some(entry) = self.idle.lock().pop_front() else {
                return Ok(None);
            };

            // try_get is synchronous and must not await a health-check query;
            // it trusts checkin-time validation plus cheap timing checks,
            // leaving the long-idle health check to the blocking `acquire` path.
            if entry.metadata.is_expired(self.config.max_lifetime)
                || entry.metadata.is_idle_expired(self.config.idle_timeout)
            {
                self.connections_closed.fetch_add(1, Ordering::Relaxed);
                drop(entry);
                continue;
            }

            let mut metadata = entry.metadata;
            metadata.mark_checkout();
            return Ok(Some(PooledConnection {
                pool: Arc::clone(self),
                client: Some(entry.client),
                permit: Some(entry.permit),
                metadata,
            }));
        }
    }

    /// Decide whether an idle connection can still be handed out: discards
    /// connections past `max_lifetime`/`idle_timeout`, and runs a full
    /// health-check round-trip on ones idle past `long_idle_threshold`.
    /// Returns `None` if the connection was discarded.
    async fn validate_idle(
        &self,
        entry: IdleEntry,
    ) -> Option<(Client<Ready>, ConnectionMetadata, OwnedSemaphorePermit)> {
        let IdleEntry {
            mut client,
            mut metadata,
            permit,
        } = entry;

        if metadata.is_expired(self.config.max_lifetime) {
            tracing::debug!(id = metadata.id, "discarding connection past max_lifetime");
            self.connections_closed.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        if metadata.is_idle_expired(self.config.idle_timeout) {
            tracing::debug!(id = metadata.id, "discarding connection past idle_timeout");
            self.connections_closed.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        if self.config.test_on_checkout && metadata.is_idle_expired(self.config.long_idle_threshold)
        {
            self.health_checks_performed.fetch_add(1, Ordering::Relaxed);
            match client.simple_query(&self.config.health_check_query).await {
                Ok(()) => metadata.mark_health_check(),
                Err(e) => {
                    tracing::debug!(
                        id = metadata.id,
                        error = %e,
                        "discarding connection that failed long-idle validation"
                    );
                    self.health_checks_failed.fetch_add(1, Ordering::Relaxed);
                    self.connections_closed.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        Some((client, metadata, permit))
    }

    /// Decide what happens to a connection being released: a connection
    /// left in an unexpected state (still in a transaction) or one whose
    /// pool has since closed is discarded; otherwise it is optionally
    /// reset and returned to the idle queue.
    async fn release(
        self: Arc<Self>,
        mut client: Client<Ready>,
        mut metadata: ConnectionMetadata,
        permit: OwnedSemaphorePermit,
    ) {
        if *self.closed.lock() {
            tracing::trace!(id = metadata.id, "pool closed, dropping released connection");
            self.connections_closed.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if client.is_in_transaction() {
            tracing::warn!(
                id = metadata.id,
                "discarding connection released mid-transaction"
            );
            self.connections_closed.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if self.config.sp_reset_connection {
            match client.reset().await {
                Ok(()) => self.resets_performed.fetch_add(1, Ordering::Relaxed),
                Err(e) => {
                    tracing::debug!(id = metadata.id, error = %e, "connection reset failed, dropping");
                    self.resets_failed.fetch_add(1, Ordering::Relaxed);
                    self.connections_closed.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            }
        }

        if self.config.test_on_checkin {
            self.health_checks_performed.fetch_add(1, Ordering::Relaxed);
            if let Err(e) = client.simple_query(&self.config.health_check_query).await {
                tracing::debug!(id = metadata.id, error = %e, "checkin validation failed, dropping");
                self.health_checks_failed.fetch_add(1, Ordering::Relaxed);
                self.connections_closed.fetch_add(1, Ordering::Relaxed);
                return;
            }
            metadata.mark_health_check();
        }

        metadata.mark_checkin();
        tracing::trace!(id = metadata.id, "returning connection to pool");
        self.idle.lock().push_back(IdleEntry {
            client,
            metadata,
            permit,
        });
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    /// Number of idle connections available.
    pub available: u32,
    /// Number of connections currently in use.
    pub in_use: u32,
    /// Total number of connections.
    pub total: u32,
    /// Maximum allowed connections.
    pub max: u32,
}

impl PoolStatus {
    /// Percentage (0-100) of the pool's capacity currently checked out.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max == 0 {
            0.0
        } else {
            f64::from(self.in_use) / f64::from(self.max) * 100.0
        }
    }
}

/// Lifetime counters for a pool, snapshotted by [`Pool::metrics`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolMetrics {
    /// Total connections opened over the pool's lifetime.
    pub connections_created: u64,
    /// Total connections discarded (expired, failed validation, or closed).
    pub connections_closed: u64,
    /// Total successful [`Pool::get`]/[`Pool::try_get`] calls.
    pub checkouts_successful: u64,
    /// Total failed [`Pool::get`]/[`Pool::try_get`] calls.
    pub checkouts_failed: u64,
    /// Total health-check queries run (checkout or checkin validation).
    pub health_checks_performed: u64,
    /// Total health-check queries that failed.
    pub health_checks_failed: u64,
    /// Total `sp_reset_connection`-equivalent resets run on checkin.
    pub resets_performed: u64,
    /// Total resets that failed.
    pub resets_failed: u64,
}

impl PoolMetrics {
    /// Fraction (0.0-1.0) of checkouts that succeeded. `1.0` if there have
    /// been no checkouts yet.
    #[must_use]
    pub fn checkout_success_rate(&self) -> f64 {
        let total = self.checkouts_successful + self.checkouts_failed;
        if total == 0 {
            1.0
        } else {
            self.checkouts_successful as f64 / total as f64
        }
    }
}

/// A connection retrieved from the pool.
///
/// When dropped, the connection is reset (if configured) and returned to
/// the pool on a spawned task, since `Drop` cannot run async code
/// directly. A connection still in a transaction when dropped is
/// discarded instead of returned, since resetting mid-transaction state
/// is not safe to do implicitly.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    client: Option<Client<Ready>>,
    permit: Option<OwnedSemaphorePermit>,
    metadata: ConnectionMetadata,
}

impl PooledConnection {
    /// Detach the connection from the pool.
    ///
    /// The connection will not be returned to the pool when dropped; its
    /// slot is freed instead, the same as if it had failed validation.
    /// Returns `None` if the connection was already detached.
    pub fn detach(mut self) -> Option<Client<Ready>> {
        self.permit.take();
        self.client.take()
    }

    /// Metadata tracked for this connection (id, timing, health-check history).
    #[must_use]
    pub fn metadata(&self) -> &ConnectionMetadata {
        &self.metadata
    }

    /// The connection's pool-assigned id, stable across checkouts.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.metadata.id
    }
}

impl std::ops::Deref for PooledConnection {
    type Target = Client<Ready>;

    fn deref(&self) -> &Self::Target {
        self.client.as_ref().expect("connection present until detached")
    }
}

impl std::ops::DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.client.as_mut().expect("connection present until detached")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let (Some(client), Some(permit)) = (self.client.take(), self.permit.take()) else {
            // Already detached.
            return;
        };

        tracing::trace!(id = self.metadata.id, "releasing connection to pool");
        let pool = Arc::clone(&self.pool);
        let metadata = self.metadata.clone();
        tokio::spawn(async move {
            pool.release(client, metadata, permit).await;
        });
    }
}

/// Fluent constructor for [`Pool`].
///
/// `client_config` is the only required setting; everything else falls
/// back to [`PoolConfig::default`].
pub struct PoolBuilder {
    pool_config: PoolConfig,
    client_config: Option<ClientConfig>,
}

impl PoolBuilder {
    fn new() -> Self {
        Self {
            pool_config: PoolConfig::new(),
            client_config: None,
        }
    }

    /// Set the client configuration used to open connections.
    #[must_use]
    pub fn client_config(mut self, config: ClientConfig) -> Self {
        self.client_config = Some(config);
        self
    }

    /// Set the minimum number of connections to keep around once opened.
    #[must_use]
    pub fn min_connections(mut self, count: u32) -> Self {
        self.pool_config.min_connections = count;
        self
    }

    /// Set the maximum number of connections allowed.
    #[must_use]
    pub fn max_connections(mut self, count: u32) -> Self {
        self.pool_config.max_connections = count;
        self
    }

    /// Set the connection acquisition timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.pool_config.connection_timeout = timeout;
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_config.idle_timeout = timeout;
        self
    }

    /// Set the maximum connection lifetime.
    #[must_use]
    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.pool_config.max_lifetime = lifetime;
        self
    }

    /// Set the long-idle validation threshold.
    #[must_use]
    pub fn long_idle_threshold(mut self, threshold: Duration) -> Self {
        self.pool_config.long_idle_threshold = threshold;
        self
    }

    /// Enable or disable testing connections on checkout.
    #[must_use]
    pub fn test_on_checkout(mut self, enabled: bool) -> Self {
        self.pool_config.test_on_checkout = enabled;
        self
    }

    /// Enable or disable testing connections on checkin.
    #[must_use]
    pub fn test_on_checkin(mut self, enabled: bool) -> Self {
        self.pool_config.test_on_checkin = enabled;
        self
    }

    /// Enable or disable `sp_reset_connection`-equivalent reset on checkin.
    #[must_use]
    pub fn sp_reset_connection(mut self, enabled: bool) -> Self {
        self.pool_config.sp_reset_connection = enabled;
        self
    }

    /// Set a custom health check query.
    #[must_use]
    pub fn health_check_query(mut self, query: impl Into<Arc<str>>) -> Self {
        self.pool_config.health_check_query = query.into();
        self
    }

    /// Build the pool.
    pub async fn build(self) -> Result<Pool, PoolError> {
        let client_config = self.client_config.ok_or_else(|| {
            PoolError::Configuration("client_config is required to build a pool".into())
        })?;
        Pool::new(self.pool_config, client_config).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn empty_inner(config: PoolConfig, closed: bool) -> Arc<PoolInner> {
        Arc::new(PoolInner {
            semaphore: Arc::new(Semaphore::new(config.max_connections as usize)),
            client_config: ClientConfig::new(),
            idle: Mutex::new(VecDeque::new()),
            next_id: AtomicU64::new(1),
            closed: Mutex::new(closed),
            connections_created: AtomicU64::new(0),
            connections_closed: AtomicU64::new(0),
            checkouts_successful: AtomicU64::new(0),
            checkouts_failed: AtomicU64::new(0),
            health_checks_performed: AtomicU64::new(0),
            health_checks_failed: AtomicU64::new(0),
            resets_performed: AtomicU64::new(0),
            resets_failed: AtomicU64::new(0),
            config: config.clone(),
        })
    }

    #[test]
    fn pool_status_on_fresh_semaphore_reports_all_available() {
        let semaphore = Arc::new(Semaphore::new(4));
        assert_eq!(semaphore.available_permits(), 4);
    }

    #[test]
    fn utilization_reports_percentage_of_max() {
        let status = PoolStatus {
            available: 2,
            in_use: 3,
            total: 5,
            max: 10,
        };
        assert!((status.utilization() - 30.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn close_marks_pool_closed_and_clears_idle() {
        let inner = empty_inner(PoolConfig::new().max_connections(2), false);
        let pool = Pool {
            config: inner.config.clone(),
            inner,
        };

        assert!(!pool.is_closed());
        pool.close().await;
        assert!(pool.is_closed());
    }

    #[tokio::test]
    async fn get_on_closed_pool_returns_pool_closed() {
        let inner = empty_inner(PoolConfig::new().max_connections(2), true);
        let pool = Pool {
            config: inner.config.clone(),
            inner,
        };

        let result = pool.get().await;
        assert!(matches!(result, Err(PoolError::PoolClosed)));
    }

    #[test]
    fn try_get_on_closed_pool_returns_pool_closed() {
        let inner = empty_inner(PoolConfig::new().max_connections(2), true);
        let pool = Pool {
            config: inner.config.clone(),
            inner,
        };

        let result = pool.try_get();
        assert!(matches!(result, Err(PoolError::PoolClosed)));
    }

    #[test]
    fn try_get_on_empty_idle_list_returns_none() {
        let inner = empty_inner(PoolConfig::new().max_connections(2), false);
        let pool = Pool {
            config: inner.config.clone(),
            inner,
        };

        let result = pool.try_get().expect("should not error");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn new_pool_creates_no_connections_eagerly() {
        let inner = empty_inner(PoolConfig::new().max_connections(5), false);
        let pool = Pool {
            config: inner.config.clone(),
            inner,
        };

        let status = pool.status();
        assert_eq!(status.total, 0);
        assert_eq!(status.available, 0);
        assert_eq!(status.in_use, 0);
        assert_eq!(pool.metrics().connections_created, 0);
    }

    #[test]
    fn checkout_success_rate_with_no_checkouts_is_one() {
        let metrics = PoolMetrics::default();
        assert!((metrics.checkout_success_rate() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn checkout_success_rate_reflects_failures() {
        let metrics = PoolMetrics {
            checkouts_successful: 3,
            checkouts_failed: 1,
            ..Default::default()
        };
        assert!((metrics.checkout_success_rate() - 0.75).abs() < f64::EPSILON);
    }
}
