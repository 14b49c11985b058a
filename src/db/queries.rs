//! Store-level operations over `&Connection`.
//!
//! Everything here is a plain function taking a connection, so callers
//! choose the transaction scope. State-machine rules live in `pool`; this
//! module only knows rows, versions and indexes.

use rusqlite::{params, types::Type, Connection};

use crate::error::{AppError, Result};
use crate::id::EntityType;
use crate::models::{
    CompanyStats, DirectoryUser, License, LicenseFilter, LicenseStatus, UsageEvent,
};

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

// ============ Licenses ============

const LICENSE_COLS: &str = "id, company_id, subscription_id, license_key, status, assigned_user_id, assigned_at, revoked_at, expires_at, created_at, updated_at, version, usage_count, last_used_at";

fn license_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<License> {
    let status_raw: String = row.get(4)?;
    let status: LicenseStatus = status_raw
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(License {
        id: row.get(0)?,
        company_id: row.get(1)?,
        subscription_id: row.get(2)?,
        license_key: row.get(3)?,
        status,
        assigned_user_id: row.get(5)?,
        assigned_at: row.get(6)?,
        revoked_at: row.get(7)?,
        expires_at: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        version: row.get(11)?,
        usage_count: row.get(12)?,
        last_used_at: row.get(13)?,
    })
}

/// Generate an opaque license key: PREFIX-XXXX-XXXX-XXXX-XXXX from a
/// 32-char unambiguous alphabet (no 0/O/1/I). 80 bits of entropy; global
/// uniqueness is still backed by the UNIQUE index.
pub fn generate_license_key(prefix: &str) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let chars: Vec<char> = "ABCDEFGHJKLMNPQRSTUVWXYZ23456789".chars().collect();

    let mut part = || -> String {
        (0..4)
            .map(|_| chars[rng.gen_range(0..chars.len())])
            .collect()
    };

    format!("{}-{}-{}-{}-{}", prefix, part(), part(), part(), part())
}

/// Create `quantity` new licenses in `active`, unassigned.
///
/// Key collisions are retried a couple of times before giving up; with
/// 80-bit keys a retry should effectively never happen.
pub fn create_licenses(
    conn: &Connection,
    company_id: &str,
    subscription_id: &str,
    quantity: i64,
    expires_at: Option<i64>,
    key_prefix: &str,
) -> Result<Vec<License>> {
    let now = now();
    let mut created = Vec::with_capacity(quantity as usize);

    for _ in 0..quantity {
        let id = EntityType::License.gen_id();

        let mut attempts = 0;
        let license_key = loop {
            let key = generate_license_key(key_prefix);
            let inserted = conn.execute(
                "INSERT INTO licenses (id, company_id, subscription_id, license_key, status, expires_at, created_at, updated_at, version, usage_count)
                 VALUES (?1, ?2, ?3, ?4, 'active', ?5, ?6, ?6, 1, 0)",
                params![&id, company_id, subscription_id, &key, expires_at, now],
            );
            match inserted {
                Ok(_) => break key,
                Err(rusqlite::Error::SqliteFailure(e, m))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation && attempts < 3 =>
                {
                    tracing::warn!(
                        "license key collision on attempt {}: {:?}",
                        attempts + 1,
                        m
                    );
                    attempts += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };

        created.push(License {
            id,
            company_id: company_id.to_string(),
            subscription_id: subscription_id.to_string(),
            license_key,
            status: LicenseStatus::Active,
            assigned_user_id: None,
            assigned_at: None,
            revoked_at: None,
            expires_at,
            created_at: now,
            updated_at: now,
            version: 1,
            usage_count: 0,
            last_used_at: None,
        });
    }

    Ok(created)
}

pub fn get_license_by_id(conn: &Connection, id: &str) -> Result<Option<License>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM licenses WHERE id = ?1",
        LICENSE_COLS
    ))?;
    let mut rows = stmt.query_map(params![id], license_from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

/// List a company's licenses with server-side filters and pagination.
pub fn list_licenses_for_company_paginated(
    conn: &Connection,
    company_id: &str,
    filter: &LicenseFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<License>, i64)> {
    let mut where_clause = String::from("company_id = ?1");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> =
        vec![Box::new(company_id.to_string())];

    if let Some(status) = filter.status {
        params_vec.push(Box::new(status.to_string()));
        where_clause.push_str(&format!(" AND status = ?{}", params_vec.len()));
    }
    match filter.assigned {
        Some(true) => where_clause.push_str(" AND assigned_user_id IS NOT NULL"),
        Some(false) => where_clause.push_str(" AND assigned_user_id IS NULL"),
        None => {}
    }

    let count_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM licenses WHERE {}", where_clause),
        count_refs.as_slice(),
        |row| row.get(0),
    )?;

    let sql = format!(
        "SELECT {} FROM licenses WHERE {} ORDER BY created_at ASC, id ASC LIMIT ?{} OFFSET ?{}",
        LICENSE_COLS,
        where_clause,
        params_vec.len() + 1,
        params_vec.len() + 2
    );
    params_vec.push(Box::new(limit));
    params_vec.push(Box::new(offset));
    let page_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(page_refs.as_slice(), license_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok((rows, total))
}

/// All licenses for a company in creation order (export path).
pub fn list_licenses_for_company(conn: &Connection, company_id: &str) -> Result<Vec<License>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM licenses WHERE company_id = ?1 ORDER BY created_at ASC, id ASC",
        LICENSE_COLS
    ))?;
    let rows = stmt
        .query_map(params![company_id], license_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Optimistic check-and-set update of a license's lifecycle fields.
///
/// Writes status/assignment/revocation/expiry from `license`, bumps the
/// version, and fails with `Conflict` if `expected_version` no longer
/// matches (the caller must re-fetch and retry). No update is ever
/// silently lost.
pub fn update_license(
    conn: &Connection,
    license: &License,
    expected_version: i64,
) -> Result<License> {
    let now = now();
    let affected = conn.execute(
        "UPDATE licenses
         SET status = ?1, assigned_user_id = ?2, assigned_at = ?3, revoked_at = ?4,
             expires_at = ?5, updated_at = ?6, version = version + 1
         WHERE id = ?7 AND version = ?8",
        params![
            license.status.to_string(),
            license.assigned_user_id,
            license.assigned_at,
            license.revoked_at,
            license.expires_at,
            now,
            license.id,
            expected_version,
        ],
    )?;

    if affected == 0 {
        // Distinguish a stale version from a missing row.
        return match get_license_by_id(conn, &license.id)? {
            Some(_) => Err(AppError::Conflict(crate::error::msg::VERSION_CONFLICT.into())),
            None => Err(AppError::NotFound(crate::error::msg::LICENSE_NOT_FOUND.into())),
        };
    }

    let mut updated = license.clone();
    updated.version = expected_version + 1;
    updated.updated_at = now;
    Ok(updated)
}

/// Oldest `active` unassigned license for a company, if any. Used by the
/// bulk orchestrator to draw one seat at a time in a stable order.
pub fn draw_active_license(conn: &Connection, company_id: &str) -> Result<Option<License>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM licenses WHERE company_id = ?1 AND status = 'active' ORDER BY created_at ASC, id ASC LIMIT 1",
        LICENSE_COLS
    ))?;
    let mut rows = stmt.query_map(params![company_id], license_from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

/// Count non-terminal licenses held by a user in a company. Non-zero means
/// the user already holds a seat (assigned, or suspended with assignment).
pub fn count_nonterminal_held_by_user(
    conn: &Connection,
    company_id: &str,
    user_id: &str,
) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM licenses
         WHERE company_id = ?1 AND assigned_user_id = ?2 AND status IN ('assigned', 'suspended')",
        params![company_id, user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Non-terminal licenses whose expiry is due. Scanned by the watchdog.
pub fn list_due_for_expiry(conn: &Connection, as_of: i64) -> Result<Vec<License>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM licenses
         WHERE expires_at IS NOT NULL AND expires_at <= ?1 AND status NOT IN ('expired', 'revoked')
         ORDER BY company_id, id",
        LICENSE_COLS
    ))?;
    let rows = stmt
        .query_map(params![as_of], license_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Atomic usage bump on the license row. Deliberately outside the CAS
/// version discipline: `usage_count + 1` is itself atomic, so recording
/// usage never invalidates a caller's concurrency token.
pub fn bump_license_usage(conn: &Connection, license_id: &str, used_at: i64) -> Result<()> {
    conn.execute(
        "UPDATE licenses SET usage_count = usage_count + 1, last_used_at = ?1 WHERE id = ?2",
        params![used_at, license_id],
    )?;
    Ok(())
}

// ============ Company stats (QueryView) ============

/// Compute the stats snapshot from one GROUP BY statement, so the counts
/// always come from a single consistent view of the table.
pub fn company_stats(conn: &Connection, company_id: &str) -> Result<CompanyStats> {
    let mut stmt = conn.prepare(
        "SELECT status, COUNT(*) FROM licenses WHERE company_id = ?1 GROUP BY status",
    )?;

    let mut active = 0i64;
    let mut assigned = 0i64;
    let mut suspended = 0i64;
    let mut expired = 0i64;
    let mut revoked = 0i64;

    let rows = stmt.query_map(params![company_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (status, count) = row?;
        match status.as_str() {
            "active" => active = count,
            "assigned" => assigned = count,
            "suspended" => suspended = count,
            "expired" => expired = count,
            "revoked" => revoked = count,
            other => {
                return Err(AppError::Internal(format!(
                    "unknown license status in store: {}",
                    other
                )))
            }
        }
    }

    let total = active + assigned + suspended + expired + revoked;
    let non_terminal = total - expired - revoked;
    let utilization_rate = if non_terminal > 0 {
        ((assigned as f64 / non_terminal as f64) * 1000.0).round() / 10.0
    } else {
        0.0
    };

    Ok(CompanyStats {
        total,
        active,
        assigned,
        suspended,
        expired,
        revoked,
        available: active,
        utilization_rate,
    })
}

// ============ Command log (idempotency) ============

/// Look up a previously applied command by idempotency key. Returns the
/// command name and the stored response license.
pub fn get_logged_command(
    conn: &Connection,
    idempotency_key: &str,
) -> Result<Option<(String, License)>> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT command, response FROM command_log WHERE idempotency_key = ?1",
            params![idempotency_key],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    match row {
        Some((command, response)) => {
            let license: License = serde_json::from_str(&response)?;
            Ok(Some((command, license)))
        }
        None => Ok(None),
    }
}

/// Record an applied command's result under its idempotency key.
pub fn log_command(
    conn: &Connection,
    idempotency_key: &str,
    company_id: &str,
    command: &str,
    license: &License,
) -> Result<()> {
    let response = serde_json::to_string(license)?;
    conn.execute(
        "INSERT INTO command_log (idempotency_key, company_id, command, license_id, response, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![idempotency_key, company_id, command, license.id, response, now()],
    )?;
    Ok(())
}

// ============ Directory users ============

const USER_COLS: &str = "id, email, name, invite_pending, created_at";

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DirectoryUser> {
    Ok(DirectoryUser {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        invite_pending: row.get::<_, i64>(3)? != 0,
        created_at: row.get(4)?,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<DirectoryUser>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLS))?;
    let mut rows = stmt.query_map(params![id], user_from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<DirectoryUser>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users WHERE email = ?1 COLLATE NOCASE",
        USER_COLS
    ))?;
    let mut rows = stmt.query_map(params![email], user_from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

/// Insert a directory user. `invite_pending` marks placeholder rows
/// created while the real invite is still out.
pub fn create_user(
    conn: &Connection,
    email: &str,
    name: Option<&str>,
    invite_pending: bool,
) -> Result<DirectoryUser> {
    let id = EntityType::User.gen_id();
    let created_at = now();
    conn.execute(
        "INSERT INTO users (id, email, name, invite_pending, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&id, email, name, invite_pending as i64, created_at],
    )?;
    Ok(DirectoryUser {
        id,
        email: email.to_string(),
        name: name.map(String::from),
        invite_pending,
        created_at,
    })
}

// ============ Usage events ============

const USAGE_COLS: &str = "id, license_id, company_id, user_id, activity, timestamp, client_meta";

fn usage_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UsageEvent> {
    Ok(UsageEvent {
        id: row.get(0)?,
        license_id: row.get(1)?,
        company_id: row.get(2)?,
        user_id: row.get(3)?,
        activity: row.get(4)?,
        timestamp: row.get(5)?,
        client_meta: row.get(6)?,
    })
}

/// Append one usage event. Rows are never updated afterwards.
pub fn insert_usage_event(conn: &Connection, event: &UsageEvent) -> Result<()> {
    conn.execute(
        "INSERT INTO usage_events (id, license_id, company_id, user_id, activity, timestamp, client_meta)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.id,
            event.license_id,
            event.company_id,
            event.user_id,
            event.activity,
            event.timestamp,
            event.client_meta,
        ],
    )?;
    Ok(())
}

pub fn list_usage_events_paginated(
    conn: &Connection,
    company_id: &str,
    license_id: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<UsageEvent>, i64)> {
    let (total, rows) = if let Some(license_id) = license_id {
        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM usage_events WHERE company_id = ?1 AND license_id = ?2",
            params![company_id, license_id],
            |row| row.get(0),
        )?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM usage_events WHERE company_id = ?1 AND license_id = ?2
             ORDER BY timestamp DESC LIMIT ?3 OFFSET ?4",
            USAGE_COLS
        ))?;
        let rows = stmt
            .query_map(params![company_id, license_id, limit, offset], usage_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        (total, rows)
    } else {
        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM usage_events WHERE company_id = ?1",
            params![company_id],
            |row| row.get(0),
        )?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM usage_events WHERE company_id = ?1
             ORDER BY timestamp DESC LIMIT ?2 OFFSET ?3",
            USAGE_COLS
        ))?;
        let rows = stmt
            .query_map(params![company_id, limit, offset], usage_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        (total, rows)
    };

    Ok((rows, total))
}
