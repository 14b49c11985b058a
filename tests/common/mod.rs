//! Test utilities and fixtures for seatpool integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::Connection;

use tokio_util::sync::CancellationToken;

pub use seatpool::db::{create_pool, init_db, init_usage_db, queries, AppState, CompanyLocks, DbPool};
pub use seatpool::directory::{SqliteDirectory, UserDirectory};
pub use seatpool::models::*;
pub use seatpool::pool::LicensePool;

pub const KEY_PREFIX: &str = "TEST";

/// Create an in-memory test database with schema initialized.
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    conn.pragma_update(None, "foreign_keys", "OFF")
        .expect("Failed to pin foreign_keys default");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create an in-memory test usage database with schema initialized.
pub fn setup_test_usage_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory usage database");
    init_usage_db(&conn).expect("Failed to initialize usage schema");
    conn
}

/// Pooled test database backed by a unique temp file (pooled connections
/// must all see the same data, which `:memory:` cannot give us). The file
/// is removed on drop.
pub struct TestDb {
    pub pool: DbPool,
    path: PathBuf,
}

impl TestDb {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!(
            "seatpool_test_{}.db",
            uuid::Uuid::new_v4().as_simple()
        ));
        let pool = create_pool(path.to_str().expect("temp path is valid utf-8"))
            .expect("Failed to create test pool");
        {
            let conn = pool.get().expect("Failed to get test connection");
            init_db(&conn).expect("Failed to initialize schema");
        }
        Self { pool, path }
    }

    /// Same temp-file pool, but with the usage-event schema.
    pub fn new_usage() -> Self {
        let path = std::env::temp_dir().join(format!(
            "seatpool_test_usage_{}.db",
            uuid::Uuid::new_v4().as_simple()
        ));
        let pool = create_pool(path.to_str().expect("temp path is valid utf-8"))
            .expect("Failed to create test usage pool");
        {
            let conn = pool.get().expect("Failed to get test connection");
            init_usage_db(&conn).expect("Failed to initialize usage schema");
        }
        Self { pool, path }
    }

    pub fn conn(&self) -> r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager> {
        self.pool.get().expect("Failed to get test connection")
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
        let _ = std::fs::remove_file(format!("{}-wal", self.path.display()));
        let _ = std::fs::remove_file(format!("{}-shm", self.path.display()));
    }
}

/// Build the state-machine layer over a test database.
pub fn test_license_pool(db: &TestDb) -> LicensePool {
    LicensePool::new(db.pool.clone(), CompanyLocks::new(), KEY_PREFIX.to_string())
}

/// Directory backed by the same test database.
pub fn test_directory(db: &TestDb) -> Arc<dyn UserDirectory> {
    Arc::new(SqliteDirectory::new(db.pool.clone()))
}

/// Full application state for exercising handlers directly. Must be
/// called inside a tokio runtime (the usage writer spawns a task).
pub fn test_state(db: &TestDb, usage_db: &TestDb) -> AppState {
    AppState {
        db: db.pool.clone(),
        usage_db: usage_db.pool.clone(),
        locks: CompanyLocks::new(),
        directory: test_directory(db),
        recorder: seatpool::usage::start(
            db.pool.clone(),
            usage_db.pool.clone(),
            CancellationToken::new(),
        ),
        license_key_prefix: KEY_PREFIX.to_string(),
        shutdown: CancellationToken::new(),
    }
}

/// Create a test directory user.
pub fn create_test_user(conn: &Connection, email: &str, name: &str) -> DirectoryUser {
    queries::create_user(conn, email, Some(name), false).expect("Failed to create test user")
}

/// Create `quantity` active licenses for a company.
pub fn create_test_licenses(
    conn: &Connection,
    company_id: &str,
    quantity: i64,
) -> Vec<License> {
    queries::create_licenses(conn, company_id, "sp_sub_test", quantity, None, KEY_PREFIX)
        .expect("Failed to create test licenses")
}

/// Unix timestamp `days` in the future.
pub fn future_timestamp(days: i64) -> i64 {
    chrono::Utc::now().timestamp() + days * 86400
}

/// Unix timestamp `days` in the past.
pub fn past_timestamp(days: i64) -> i64 {
    chrono::Utc::now().timestamp() - days * 86400
}

/// Assert the status-count conservation rule: every status bucket sums to
/// the company's total created count.
pub fn assert_counts_conserved(conn: &Connection, company_id: &str) {
    let stats = queries::company_stats(conn, company_id).expect("Failed to compute stats");
    assert_eq!(
        stats.total,
        stats.active + stats.assigned + stats.suspended + stats.expired + stats.revoked,
        "status counts must sum to total"
    );
}
