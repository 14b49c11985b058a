//! License lifecycle state machine.
//!
//! All mutations go through `LicensePool`. Commands for one company are
//! serialized through that company's lock and applied inside a single
//! SQLite transaction, so the status check and the per-(company, user)
//! uniqueness check in `assign` are one atomic check-and-set. Different
//! companies proceed in parallel.
//!
//! Transition table:
//!
//! ```text
//! create                     -> active
//! active    --assign-------> assigned
//! assigned  --unassign-----> active
//! active    --suspend------> suspended
//! assigned  --suspend------> suspended     (assignment preserved)
//! suspended --reactivate---> active | assigned (by preserved assignment)
//! non-terminal --expire----> expired       (terminal, time-driven)
//! non-terminal --force_revoke-> revoked    (terminal, admin-driven)
//! ```

use std::collections::BTreeMap;

use rusqlite::{Connection, TransactionBehavior};

use crate::db::{queries, CompanyLocks, DbPool};
use crate::error::{msg, AppError, Result};
use crate::models::{License, LicenseStatus};

const CMD_ASSIGN: &str = "assign";
const CMD_UNASSIGN: &str = "unassign";

pub struct LicensePool {
    db: DbPool,
    locks: CompanyLocks,
    key_prefix: String,
}

impl LicensePool {
    pub fn new(db: DbPool, locks: CompanyLocks, key_prefix: String) -> Self {
        Self {
            db,
            locks,
            key_prefix,
        }
    }

    /// Create `quantity` licenses in `active`, unassigned.
    pub async fn create(
        &self,
        company_id: &str,
        subscription_id: &str,
        quantity: i64,
        expires_at: Option<i64>,
    ) -> Result<Vec<License>> {
        if !(1..=1000).contains(&quantity) {
            return Err(AppError::Validation(msg::QUANTITY_OUT_OF_RANGE.into()));
        }

        let lock = self.locks.for_company(company_id);
        let _guard = lock.lock().await;

        let mut conn = self.db.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let created = queries::create_licenses(
            &tx,
            company_id,
            subscription_id,
            quantity,
            expires_at,
            &self.key_prefix,
        )?;
        tx.commit()?;

        tracing::info!(
            "created {} license(s) for company {} (subscription: {})",
            created.len(),
            company_id,
            subscription_id
        );
        Ok(created)
    }

    /// Bind an `active` license to a user.
    ///
    /// Fails with `Conflict` if the user already holds a non-terminal seat
    /// in the company, `InvalidState` if the license is not `active`, and
    /// `NotFound` if it does not exist in the company. Resubmitting the
    /// same idempotency key returns the prior result instead of erroring.
    pub async fn assign(
        &self,
        company_id: &str,
        license_id: &str,
        user_id: &str,
        idempotency_key: &str,
    ) -> Result<License> {
        let lock = self.locks.for_company(company_id);
        let _guard = lock.lock().await;

        let mut conn = self.db.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(prior) = replay(&tx, idempotency_key, CMD_ASSIGN)? {
            tx.commit()?;
            return Ok(prior);
        }

        let license = fetch_company_license(&tx, company_id, license_id)?;
        if license.status != LicenseStatus::Active {
            return Err(AppError::InvalidState(format!(
                "cannot assign a license in status '{}'",
                license.status
            )));
        }

        // Uniqueness check and the status CAS below commit together, so two
        // racing assigns for one user cannot both pass.
        if queries::count_nonterminal_held_by_user(&tx, company_id, user_id)? > 0 {
            return Err(AppError::Conflict(msg::USER_ALREADY_LICENSED.into()));
        }

        let mut next = license.clone();
        next.status = LicenseStatus::Assigned;
        next.assigned_user_id = Some(user_id.to_string());
        next.assigned_at = Some(queries::now());
        let updated = queries::update_license(&tx, &next, license.version)?;

        queries::log_command(&tx, idempotency_key, company_id, CMD_ASSIGN, &updated)?;
        tx.commit()?;

        tracing::info!(
            "assigned license {} to user {} (company: {})",
            license_id,
            user_id,
            company_id
        );
        Ok(updated)
    }

    /// Return an `assigned` seat to the pool. Distinct from permanent
    /// revocation: the license goes back to `active`, unassigned.
    pub async fn unassign(
        &self,
        company_id: &str,
        license_id: &str,
        idempotency_key: &str,
    ) -> Result<License> {
        let lock = self.locks.for_company(company_id);
        let _guard = lock.lock().await;

        let mut conn = self.db.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(prior) = replay(&tx, idempotency_key, CMD_UNASSIGN)? {
            tx.commit()?;
            return Ok(prior);
        }

        let license = fetch_company_license(&tx, company_id, license_id)?;
        if license.status != LicenseStatus::Assigned {
            return Err(AppError::InvalidState(format!(
                "cannot unassign a license in status '{}'",
                license.status
            )));
        }

        let mut next = license.clone();
        next.status = LicenseStatus::Active;
        next.assigned_user_id = None;
        next.assigned_at = None;
        let updated = queries::update_license(&tx, &next, license.version)?;

        queries::log_command(&tx, idempotency_key, company_id, CMD_UNASSIGN, &updated)?;
        tx.commit()?;

        tracing::info!("unassigned license {} (company: {})", license_id, company_id);
        Ok(updated)
    }

    /// Draw the oldest `active` license and assign it to a user, as one
    /// atomic command. Returns `Ok(None)` when the pool is exhausted
    /// (no `active` seat left), so the bulk orchestrator can stop drawing
    /// without treating exhaustion as an error.
    pub async fn assign_next_available(
        &self,
        company_id: &str,
        user_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<License>> {
        let lock = self.locks.for_company(company_id);
        let _guard = lock.lock().await;

        let mut conn = self.db.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(prior) = replay(&tx, idempotency_key, CMD_ASSIGN)? {
            tx.commit()?;
            return Ok(Some(prior));
        }

        if queries::count_nonterminal_held_by_user(&tx, company_id, user_id)? > 0 {
            return Err(AppError::Conflict(msg::USER_ALREADY_LICENSED.into()));
        }

        let Some(license) = queries::draw_active_license(&tx, company_id)? else {
            return Ok(None);
        };

        let mut next = license.clone();
        next.status = LicenseStatus::Assigned;
        next.assigned_user_id = Some(user_id.to_string());
        next.assigned_at = Some(queries::now());
        let updated = queries::update_license(&tx, &next, license.version)?;

        queries::log_command(&tx, idempotency_key, company_id, CMD_ASSIGN, &updated)?;
        tx.commit()?;

        tracing::info!(
            "assigned drawn license {} to user {} (company: {})",
            updated.id,
            user_id,
            company_id
        );
        Ok(Some(updated))
    }

    /// Temporarily disable a usable license. An assignment, if any, is
    /// preserved and keeps counting against the per-user uniqueness rule.
    pub async fn suspend(&self, company_id: &str, license_id: &str) -> Result<License> {
        let lock = self.locks.for_company(company_id);
        let _guard = lock.lock().await;

        let mut conn = self.db.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let license = fetch_company_license(&tx, company_id, license_id)?;
        if !matches!(
            license.status,
            LicenseStatus::Active | LicenseStatus::Assigned
        ) {
            return Err(AppError::InvalidState(format!(
                "cannot suspend a license in status '{}'",
                license.status
            )));
        }

        let mut next = license.clone();
        next.status = LicenseStatus::Suspended;
        let updated = queries::update_license(&tx, &next, license.version)?;
        tx.commit()?;

        tracing::info!("suspended license {} (company: {})", license_id, company_id);
        Ok(updated)
    }

    /// Restore a `suspended` license to the state it held before
    /// suspension, based on whether an assignment was preserved.
    pub async fn reactivate(&self, company_id: &str, license_id: &str) -> Result<License> {
        let lock = self.locks.for_company(company_id);
        let _guard = lock.lock().await;

        let mut conn = self.db.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let license = fetch_company_license(&tx, company_id, license_id)?;
        if license.status != LicenseStatus::Suspended {
            return Err(AppError::InvalidState(format!(
                "cannot reactivate a license in status '{}'",
                license.status
            )));
        }

        let mut next = license.clone();
        next.status = if license.assigned_user_id.is_some() {
            LicenseStatus::Assigned
        } else {
            LicenseStatus::Active
        };
        let updated = queries::update_license(&tx, &next, license.version)?;
        tx.commit()?;

        tracing::info!(
            "reactivated license {} to '{}' (company: {})",
            license_id,
            updated.status,
            company_id
        );
        Ok(updated)
    }

    /// Terminal, admin-driven, irreversible revocation.
    pub async fn force_revoke(&self, company_id: &str, license_id: &str) -> Result<License> {
        let lock = self.locks.for_company(company_id);
        let _guard = lock.lock().await;

        let mut conn = self.db.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let license = fetch_company_license(&tx, company_id, license_id)?;
        if license.status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "cannot revoke a license in status '{}'",
                license.status
            )));
        }

        let mut next = license.clone();
        next.status = LicenseStatus::Revoked;
        next.assigned_user_id = None;
        next.assigned_at = None;
        next.revoked_at = Some(queries::now());
        let updated = queries::update_license(&tx, &next, license.version)?;
        tx.commit()?;

        tracing::info!(
            "force-revoked license {} (company: {})",
            license_id,
            company_id
        );
        Ok(updated)
    }

    /// Terminal, time-driven expiry of one license. Driven by the expiry
    /// watchdog; also callable directly for tests and admin tooling.
    pub async fn expire(&self, company_id: &str, license_id: &str) -> Result<License> {
        let lock = self.locks.for_company(company_id);
        let _guard = lock.lock().await;

        let mut conn = self.db.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let license = fetch_company_license(&tx, company_id, license_id)?;
        if license.status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "cannot expire a license in status '{}'",
                license.status
            )));
        }

        let mut next = license.clone();
        next.status = LicenseStatus::Expired;
        next.assigned_user_id = None;
        next.assigned_at = None;
        let updated = queries::update_license(&tx, &next, license.version)?;
        tx.commit()?;

        tracing::info!("expired license {} (company: {})", license_id, company_id);
        Ok(updated)
    }

    /// Expire every due non-terminal license, serialized per company.
    /// Returns the number of licenses transitioned.
    pub async fn expire_due(&self, as_of: i64) -> Result<usize> {
        let due = {
            let conn = self.db.get()?;
            queries::list_due_for_expiry(&conn, as_of)?
        };
        if due.is_empty() {
            return Ok(0);
        }

        let mut by_company: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for license in due {
            by_company
                .entry(license.company_id)
                .or_default()
                .push(license.id);
        }

        let mut expired = 0;
        for (company_id, license_ids) in by_company {
            for license_id in license_ids {
                match self.expire(&company_id, &license_id).await {
                    Ok(_) => expired += 1,
                    // Another command got there first; the scan is stale,
                    // not wrong.
                    Err(AppError::InvalidState(_)) | Err(AppError::NotFound(_)) => {}
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(expired)
    }
}

/// Replay lookup for an idempotent command. A key reused for a different
/// command is a conflict, not a replay.
fn replay(conn: &Connection, idempotency_key: &str, command: &str) -> Result<Option<License>> {
    match queries::get_logged_command(conn, idempotency_key)? {
        Some((logged_command, license)) if logged_command == command => {
            tracing::debug!(
                "idempotent replay of '{}' (key: {})",
                command,
                idempotency_key
            );
            Ok(Some(license))
        }
        Some((logged_command, _)) => Err(AppError::Conflict(format!(
            "idempotency key already used for '{}'",
            logged_command
        ))),
        None => Ok(None),
    }
}

/// Fetch a license and verify it belongs to the company. A license in a
/// different company is reported as not found, never leaked.
fn fetch_company_license(conn: &Connection, company_id: &str, license_id: &str) -> Result<License> {
    let license = queries::get_license_by_id(conn, license_id)?
        .ok_or_else(|| AppError::NotFound(msg::LICENSE_NOT_FOUND.into()))?;
    if license.company_id != company_id {
        return Err(AppError::NotFound(msg::LICENSE_NOT_FOUND.into()));
    }
    Ok(license)
}
