//! Live SQL Server integration tests for the catalog surface.
//!
//! Mirrors `mssql-client`'s own integration suite: these require a running
//! SQL Server instance and are ignored by default.
//!
//! ```bash
//! export MSSQL_HOST=localhost
//! export MSSQL_USER=sa
//! export MSSQL_PASSWORD=YourStrongPassw0rd
//! cargo test -p mssql-catalog --test integration -- --ignored
//! ```
//!
//! The mock TDS server in `mssql-testing` cannot stand in here: it has no
//! TLS support, and a real client can't complete login without it (see
//! `mssql-testing/tests/mock_fidelity.rs`), so the scenarios below that
//! need an actual multi-statement conversation run only against a live
//! server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use mssql_catalog::{AccessMode, Catalog, CatalogConfig};
use mssql_client::Config;

fn get_test_config() -> Option<Config> {
    let host = std::env::var("MSSQL_HOST").ok()?;
    let port = std::env::var("MSSQL_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(1433);
    let user = std::env::var("MSSQL_USER").unwrap_or_else(|_| "sa".into());
    let password = std::env::var("MSSQL_PASSWORD").unwrap_or_else(|_| "MyStrongPassw0rd".into());
    let database = std::env::var("MSSQL_DATABASE").unwrap_or_else(|_| "master".into());
    let encrypt = std::env::var("MSSQL_ENCRYPT").unwrap_or_else(|_| "false".into());

    let conn_str = format!(
        "Server={host},{port};Database={database};User Id={user};Password={password};\
         TrustServerCertificate=true;Encrypt={encrypt}"
    );
    Config::from_connection_string(&conn_str).ok()
}

#[tokio::test]
#[ignore = "Requires SQL Server"]
async fn attach_and_scan_round_trip() {
    let config = get_test_config().expect("SQL Server config required");
    let catalog = Catalog::attach(config, AccessMode::ReadWrite, CatalogConfig::new())
        .await
        .expect("attach should succeed");

    let affected = catalog
        .execute_raw_batch(
            "IF OBJECT_ID('dbo.catalog_it_scan', 'U') IS NOT NULL DROP TABLE dbo.catalog_it_scan; \
             CREATE TABLE dbo.catalog_it_scan (id INT NOT NULL, name NVARCHAR(50) NOT NULL); \
             INSERT INTO dbo.catalog_it_scan (id, name) VALUES (1, 'a'), (2, 'b');",
        )
        .await
        .expect("setup batch should succeed");
    assert_eq!(affected, 2);

    let mut scan = catalog
        .scan(
            "SELECT id, name FROM dbo.catalog_it_scan ORDER BY id",
            mssql_catalog::Projection::identity(2),
        )
        .await
        .expect("scan should start");

    let chunk = scan.fill_chunk(10).await.expect("chunk should fetch");
    assert_eq!(chunk.rows.len(), 2);

    catalog.detach().await;
}

#[tokio::test]
#[ignore = "Requires SQL Server"]
async fn scan_inside_transaction_is_forbidden() {
    let config = get_test_config().expect("SQL Server config required");
    let catalog = Catalog::attach(config, AccessMode::ReadWrite, CatalogConfig::new())
        .await
        .expect("attach should succeed");

    catalog
        .begin_transaction()
        .await
        .expect("begin should succeed");

    let result = catalog
        .scan("SELECT 1", mssql_catalog::Projection::identity(1))
        .await;
    assert!(matches!(
        result,
        Err(mssql_catalog::CatalogError::ScanInsideTransactionForbidden)
    ));

    catalog.rollback().await.expect("rollback should succeed");
    catalog.detach().await;
}

#[tokio::test]
#[ignore = "Requires SQL Server"]
async fn deferred_dml_then_scan_on_same_catalog() {
    let config = get_test_config().expect("SQL Server config required");
    let catalog = Catalog::attach(config, AccessMode::ReadWrite, CatalogConfig::new())
        .await
        .expect("attach should succeed");

    catalog
        .execute_raw_batch(
            "IF OBJECT_ID('dbo.catalog_it_deferred', 'U') IS NOT NULL DROP TABLE dbo.catalog_it_deferred; \
             CREATE TABLE dbo.catalog_it_deferred (id INT NOT NULL PRIMARY KEY, total INT NOT NULL);",
        )
        .await
        .expect("setup should succeed");

    catalog
        .begin_transaction()
        .await
        .expect("begin should succeed");
    let result = catalog
        .insert_rows(
            "dbo",
            "catalog_it_deferred",
            vec!["id".into(), "total".into()],
            vec![],
            vec![vec![
                mssql_types::SqlValue::Int(1),
                mssql_types::SqlValue::Int(10),
            ]],
        )
        .await
        .expect("pinned insert should succeed");
    assert_eq!(result.rows_affected, 1);
    catalog.commit().await.expect("commit should succeed");

    let mut scan = catalog
        .scan(
            "SELECT id, total FROM dbo.catalog_it_deferred",
            mssql_catalog::Projection::identity(2),
        )
        .await
        .expect("post-commit scan should succeed");
    let chunk = scan.fill_chunk(10).await.expect("chunk should fetch");
    assert_eq!(chunk.rows.len(), 1);

    catalog.detach().await;
}
