use axum::{
    extract::{Path, State},
    Json,
};

use crate::bulk::bulk_assign;
use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::models::{BulkAssignRequest, BulkAssignResponse};

use super::licenses::CompanyPath;

const MAX_BULK_EMAILS: usize = 1000;

/// POST /companies/{company_id}/licenses/bulk-assign
/// Best-effort batch: per-item outcomes, no rollback of applied work.
/// Server shutdown cancels the run; completed assignments stay in effect.
pub async fn bulk_assign_licenses(
    State(state): State<AppState>,
    Path(path): Path<CompanyPath>,
    Json(body): Json<BulkAssignRequest>,
) -> Result<Json<BulkAssignResponse>> {
    if body.emails.is_empty() {
        return Err(AppError::Validation("emails must not be empty".into()));
    }
    if body.emails.len() > MAX_BULK_EMAILS {
        return Err(AppError::Validation(format!(
            "at most {} emails per batch",
            MAX_BULK_EMAILS
        )));
    }

    let pool = state.license_pool();
    let response = bulk_assign(
        &pool,
        &state.directory,
        &path.company_id,
        &body.emails,
        &state.shutdown,
    )
    .await?;

    Ok(Json(response))
}
