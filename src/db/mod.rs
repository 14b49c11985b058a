mod schema;
pub mod queries;

pub use schema::{init_db, init_usage_db};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::directory::UserDirectory;
use crate::usage::UsageRecorder;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Registry of per-company async locks. All commands affecting one company
/// are serialized through its lock, so the cross-license uniqueness rule
/// needs no distributed coordination; different companies proceed in
/// parallel.
#[derive(Clone, Default)]
pub struct CompanyLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl CompanyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the lock for a company.
    pub fn for_company(&self, company_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().expect("company lock registry poisoned");
        map.entry(company_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Application state holding database pools and engine collaborators.
#[derive(Clone)]
pub struct AppState {
    /// Main database pool (licenses, users, command log)
    pub db: DbPool,
    /// Usage event database pool (separate file to isolate append growth)
    pub usage_db: DbPool,
    /// Per-company command serialization
    pub locks: CompanyLocks,
    /// External directory resolving emails to user identities
    pub directory: Arc<dyn UserDirectory>,
    /// Non-blocking usage event recorder
    pub recorder: UsageRecorder,
    /// Prefix for newly minted license keys
    pub license_key_prefix: String,
    /// Server-wide shutdown token; long-running batch work observes it
    pub shutdown: tokio_util::sync::CancellationToken,
}

impl AppState {
    /// Build the state-machine layer over this state's store.
    pub fn license_pool(&self) -> crate::pool::LicensePool {
        crate::pool::LicensePool::new(
            self.db.clone(),
            self.locks.clone(),
            self.license_key_prefix.clone(),
        )
    }
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path)
        // Bounded store timeout: callers see a retryable error instead of
        // waiting indefinitely on a locked database.
        .with_init(|conn| {
            conn.busy_timeout(Duration::from_secs(5))?;
            // Pin to stock SQLite's default: REFERENCES clauses are
            // advisory, the directory is the source of truth for users.
            conn.pragma_update(None, "foreign_keys", "OFF")
        });
    Pool::builder().max_size(10).build(manager)
}
