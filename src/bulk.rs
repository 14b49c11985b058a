//! Bulk assignment orchestrator.
//!
//! Drives a batch of assignments over a list of emails: resolve each one
//! through the user directory, draw one active seat, assign. Explicitly a
//! best-effort batch, not a transaction: per-item failures are captured in
//! that item's result, pool exhaustion stops further draws, cancellation
//! stops the run, and already-applied assignments are never rolled back.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::directory::{is_valid_email, UserDirectory};
use crate::error::{AppError, Result};
use crate::models::{BulkAssignResponse, BulkItemResult, BulkOutcome, BulkSummary};
use crate::pool::LicensePool;

/// Run a bulk assignment for `company_id` over `emails`.
///
/// Emails are deduplicated case-insensitively (first occurrence wins,
/// original casing is reported back) and processed in input order. The
/// token cancels the run between items; completed work stays in effect.
pub async fn bulk_assign(
    pool: &LicensePool,
    directory: &Arc<dyn UserDirectory>,
    company_id: &str,
    emails: &[String],
    cancel: &CancellationToken,
) -> Result<BulkAssignResponse> {
    let mut seen: HashSet<String> = HashSet::new();
    let batch: Vec<&String> = emails
        .iter()
        .filter(|e| seen.insert(e.to_lowercase()))
        .collect();

    let submitted = batch.len();
    let mut items = Vec::with_capacity(submitted);
    let mut exhausted = false;
    let mut cancelled = false;

    for email in batch {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }

        items.push(process_one(pool, directory, company_id, email, &mut exhausted).await?);
    }

    let assigned = items
        .iter()
        .filter(|i| i.outcome == BulkOutcome::Assigned)
        .count();
    let summary = BulkSummary {
        submitted,
        assigned,
        failed: items.len() - assigned,
        cancelled,
    };

    tracing::info!(
        "bulk assign for company {}: {} submitted, {} assigned, {} failed{}",
        company_id,
        summary.submitted,
        summary.assigned,
        summary.failed,
        if cancelled { " (cancelled)" } else { "" }
    );

    Ok(BulkAssignResponse { items, summary })
}

async fn process_one(
    pool: &LicensePool,
    directory: &Arc<dyn UserDirectory>,
    company_id: &str,
    email: &str,
    exhausted: &mut bool,
) -> Result<BulkItemResult> {
    // Shape validation costs nothing and draws no seat, so it still runs
    // after exhaustion.
    if !is_valid_email(email) {
        return Ok(item(email, BulkOutcome::InvalidEmail, None, Some("malformed email".into())));
    }

    // Pool ran dry earlier in this batch: stop drawing, skip resolution.
    if *exhausted {
        return Ok(item(
            email,
            BulkOutcome::NoLicenseAvailable,
            None,
            Some("license pool exhausted".into()),
        ));
    }

    let user = match directory.resolve_email(email) {
        Ok(user) => user,
        Err(e) => {
            return Ok(item(
                email,
                BulkOutcome::UserResolutionFailed,
                None,
                Some(e.to_string()),
            ));
        }
    };

    // One idempotency key per batch item; a retried store write inside the
    // pool replays instead of double-assigning.
    let idempotency_key = format!("bulk_{}", Uuid::new_v4().as_simple());

    match pool
        .assign_next_available(company_id, &user.id, &idempotency_key)
        .await
    {
        Ok(Some(license)) => Ok(item(email, BulkOutcome::Assigned, Some(license), None)),
        Ok(None) => {
            *exhausted = true;
            Ok(item(
                email,
                BulkOutcome::NoLicenseAvailable,
                None,
                Some("license pool exhausted".into()),
            ))
        }
        Err(AppError::Conflict(detail)) => {
            Ok(item(email, BulkOutcome::AlreadyLicensed, None, Some(detail)))
        }
        // Infrastructure failure: surface it; applied items stay applied.
        Err(e) => Err(e),
    }
}

fn item(
    email: &str,
    outcome: BulkOutcome,
    license: Option<crate::models::License>,
    detail: Option<String>,
) -> BulkItemResult {
    BulkItemResult {
        email: email.to_string(),
        outcome,
        license,
        detail,
    }
}
