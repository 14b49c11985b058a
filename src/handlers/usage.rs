use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::id::is_valid_prefixed_id;
use crate::models::{RecordUsage, UsageEvent};
use crate::pagination::{Paginated, PaginationQuery};

use super::licenses::CompanyPath;

#[derive(Debug, Deserialize)]
pub struct RecordUsageBody {
    pub license_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub activity: String,
    #[serde(default)]
    pub client_meta: Option<String>,
}

/// POST /companies/{company_id}/usage
/// Queue a usage event. Returns 202: the append happens in the background
/// writer and never blocks the caller.
pub async fn record_usage(
    State(state): State<AppState>,
    Path(path): Path<CompanyPath>,
    Json(body): Json<RecordUsageBody>,
) -> Result<StatusCode> {
    if body.activity.is_empty() {
        return Err(AppError::Validation("activity is required".into()));
    }
    if !is_valid_prefixed_id(&body.license_id) {
        return Err(AppError::Validation(msg::INVALID_LICENSE_ID.into()));
    }

    // Validate the license exists and belongs to this company before
    // queueing; the event itself is written asynchronously.
    let conn = state.db.get()?;
    let license = queries::get_license_by_id(&conn, &body.license_id)?
        .or_not_found(msg::LICENSE_NOT_FOUND)?;
    if license.company_id != path.company_id {
        return Err(AppError::NotFound(msg::LICENSE_NOT_FOUND.into()));
    }

    state.recorder.record(RecordUsage {
        license_id: body.license_id,
        company_id: path.company_id,
        user_id: body.user_id,
        activity: body.activity,
        client_meta: body.client_meta,
    });

    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Default, Deserialize)]
pub struct ListUsageQuery {
    /// Restrict to one license
    pub license_id: Option<String>,
}

/// GET /companies/{company_id}/usage
pub async fn list_usage(
    State(state): State<AppState>,
    Path(path): Path<CompanyPath>,
    Query(query): Query<ListUsageQuery>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<Paginated<UsageEvent>>> {
    let conn = state.usage_db.get()?;

    let (events, total) = queries::list_usage_events_paginated(
        &conn,
        &path.company_id,
        query.license_id.as_deref(),
        page.limit(),
        page.offset(),
    )?;

    Ok(Json(Paginated::page(events, total, &page)))
}
