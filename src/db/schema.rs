use rusqlite::Connection;

/// Initialize the main database schema (licenses, directory users,
/// idempotent command log).
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Directory users (resolution results; the external directory is
        -- the source of truth, unknown emails get a pending-invite row)
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT,
            invite_pending INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);

        -- Licenses (seats). Never hard-deleted: terminal rows are kept
        -- for audit and reporting, pruning is an external concern.
        CREATE TABLE IF NOT EXISTS licenses (
            id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            subscription_id TEXT NOT NULL,
            license_key TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL CHECK (status IN ('active', 'assigned', 'suspended', 'expired', 'revoked')),
            assigned_user_id TEXT REFERENCES users(id),
            assigned_at INTEGER,
            revoked_at INTEGER,
            expires_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            usage_count INTEGER NOT NULL DEFAULT 0,
            last_used_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_licenses_company ON licenses(company_id);
        CREATE INDEX IF NOT EXISTS idx_licenses_company_status ON licenses(company_id, status);
        CREATE INDEX IF NOT EXISTS idx_licenses_expiry ON licenses(expires_at) WHERE expires_at IS NOT NULL AND status NOT IN ('expired', 'revoked');
        -- Backstop for the per-(company, user) uniqueness rule: at most one
        -- non-terminal license may hold a given user. The pool checks this
        -- inside the assign transaction first so callers see Conflict, not
        -- a raw constraint error.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_licenses_holder
            ON licenses(company_id, assigned_user_id)
            WHERE assigned_user_id IS NOT NULL AND status IN ('assigned', 'suspended');

        -- Idempotent command log. A replayed idempotency key returns the
        -- stored response instead of re-applying the command.
        CREATE TABLE IF NOT EXISTS command_log (
            idempotency_key TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            command TEXT NOT NULL,
            license_id TEXT NOT NULL,
            response TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_command_log_company ON command_log(company_id);
        "#,
    )?;
    Ok(())
}

/// Initialize the usage event database schema (separate DB file).
/// Optimized for append-only workload with WAL mode.
pub fn init_usage_db(conn: &Connection) -> rusqlite::Result<()> {
    // WAL mode: writes are sequential appends, much faster for append-only
    // workloads. synchronous=NORMAL is safe with WAL.
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA wal_autocheckpoint = 1000;
        PRAGMA journal_size_limit = 67108864;

        CREATE TABLE IF NOT EXISTS usage_events (
            id TEXT PRIMARY KEY,
            license_id TEXT NOT NULL,
            company_id TEXT NOT NULL,
            user_id TEXT,
            activity TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            client_meta TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_usage_events_license ON usage_events(license_id, timestamp DESC);
        CREATE INDEX IF NOT EXISTS idx_usage_events_company_time ON usage_events(company_id, timestamp DESC);
        "#,
    )?;
    Ok(())
}
