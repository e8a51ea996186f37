//! Connection provider (component I): maps a host transaction context to
//! either a pinned connection or a fresh pool checkout.

use std::sync::Arc;

use mssql_client::{Client, InTransaction, SavePoint};
use mssql_driver_pool::{Pool, PooledConnection};
use parking_lot::Mutex;

use crate::error::{CatalogError, Result};

/// Tracks whether the host's current transaction context has a
/// connection pinned, and enforces the "no scan inside a host
/// transaction" MVP rule.
///
/// `Pool` itself only knows `pinned: bool` per idle/active entry; this is
/// the layer that actually holds the pinned handle and answers
/// `is_in_transaction` for a given context. The pinned connection is held
/// in `Client<InTransaction>` state for the lifetime of the pin — it is
/// detached from the pool at `begin`, so it is never subject to the
/// pool's own idle-validation or reaping while pinned.
pub struct ConnectionProvider {
    pool: Arc<Pool>,
    pinned: Mutex<Option<Client<InTransaction>>>,
}

impl ConnectionProvider {
    /// Wrap a pool with transaction-pinning support.
    pub fn new(pool: Arc<Pool>) -> Self {
        Self {
            pool,
            pinned: Mutex::new(None),
        }
    }

    /// Whether a connection is currently pinned to a host transaction.
    pub fn is_in_transaction(&self) -> bool {
        self.pinned.lock().is_some()
    }

    /// Acquire a connection for a general operation (DML, raw batch,
    /// scan). Always goes to the pool; callers that need to run inside
    /// the pinned transaction use [`Self::execute_pinned`]/
    /// [`Self::savepoint`] instead.
    pub async fn acquire(&self) -> Result<PooledConnection> {
        Ok(self.pool.get().await?)
    }

    /// Begin a host transaction: acquire a connection, detach it from
    /// the pool, and move it into `InTransaction` state.
    ///
    /// Returns [`CatalogError::Protocol`] if a transaction is already
    /// pinned.
    pub async fn begin(&self) -> Result<()> {
        if self.is_in_transaction() {
            return Err(CatalogError::Protocol(
                "a transaction is already pinned for this catalog".into(),
            ));
        }
        let conn = self.pool.get().await?;
        let client = conn
            .detach()
            .ok_or_else(|| CatalogError::Protocol("connection already detached".into()))?;
        let tx_client = client.begin_transaction().await?;
        *self.pinned.lock() = Some(tx_client);
        Ok(())
    }

    fn take_pinned(&self) -> Result<Client<InTransaction>> {
        self.pinned
            .lock()
            .take()
            .ok_or_else(|| CatalogError::Protocol("no active transaction for this catalog".into()))
    }

    /// Commit the pinned transaction. The connection is not returned to
    /// the pool (pinned connections are discarded once unpinned, the
    /// same as `PooledConnection::detach`'s contract) — it is closed
    /// cleanly instead of leaking the socket.
    pub async fn commit(&self) -> Result<()> {
        let client = self.take_pinned()?;
        let ready = client.commit().await?;
        ready.close().await?;
        Ok(())
    }

    /// Roll back the pinned transaction.
    pub async fn rollback(&self) -> Result<()> {
        let client = self.take_pinned()?;
        let ready = client.rollback().await?;
        ready.close().await?;
        Ok(())
    }

    /// Create a named savepoint within the pinned transaction.
    ///
    /// The pinned client is taken out of the mutex for the duration of the
    /// call and put back afterwards — a `parking_lot::MutexGuard` held
    /// across an `.await` isn't `Send`, which this crate's host is
    /// expected to require of its futures.
    pub async fn savepoint(&self, name: &str) -> Result<SavePoint> {
        let mut client = self.take_pinned()?;
        let result = client.save_point(name).await;
        *self.pinned.lock() = Some(client);
        Ok(result?)
    }

    /// Execute a statement against the pinned transaction connection.
    pub async fn execute_pinned(&self, sql: &str) -> Result<u64> {
        let mut client = self.take_pinned()?;
        let result = client.execute(sql, &[]).await;
        *self.pinned.lock() = Some(client);
        Ok(result?)
    }

    /// Run a batcher operation against the pinned transaction connection,
    /// via [`crate::dml::SqlExecutor`]. Same take-out/put-back shape as
    /// [`Self::execute_pinned`].
    pub async fn with_pinned_executor<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Client<InTransaction>) -> Fut,
        Fut: std::future::Future<Output = (Client<InTransaction>, Result<T>)>,
    {
        let client = self.take_pinned()?;
        let (client, result) = f(client).await;
        *self.pinned.lock() = Some(client);
        result
    }

    /// Enforce the MVP rule: scanning an attached table is forbidden
    /// while a connection is pinned to a host transaction.
    pub fn check_scan_allowed(&self) -> Result<()> {
        if self.is_in_transaction() {
            return Err(CatalogError::ScanInsideTransactionForbidden);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_scan_allowed_logic_mirrors_is_in_transaction() {
        let pinned_flag = Mutex::new(false);
        let check = |flag: &Mutex<bool>| -> Result<()> {
            if *flag.lock() {
                Err(CatalogError::ScanInsideTransactionForbidden)
            } else {
                Ok(())
            }
        };

        assert!(check(&pinned_flag).is_ok());
        *pinned_flag.lock() = true;
        assert!(matches!(
            check(&pinned_flag),
            Err(CatalogError::ScanInsideTransactionForbidden)
        ));
    }
}
