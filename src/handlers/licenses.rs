use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::db::{queries, AppState};
use crate::directory::is_valid_email;
use crate::error::{msg, AppError, OptionExt, Result};
use crate::export::licenses_to_csv;
use crate::id::is_valid_prefixed_id;
use crate::models::{CreateLicenses, License, LicenseFilter};
use crate::pagination::{Paginated, PaginationQuery};

#[derive(Deserialize)]
pub struct CompanyPath {
    pub company_id: String,
}

#[derive(Deserialize)]
pub struct LicensePath {
    pub company_id: String,
    pub license_id: String,
}

/// POST /companies/{company_id}/licenses
/// Create a batch of licenses in `active`, unassigned.
pub async fn create_licenses(
    State(state): State<AppState>,
    Path(path): Path<CompanyPath>,
    Json(body): Json<CreateLicenses>,
) -> Result<Json<Vec<License>>> {
    if body.subscription_id.is_empty() {
        return Err(AppError::Validation("subscription_id is required".into()));
    }

    let created = state
        .license_pool()
        .create(
            &path.company_id,
            &body.subscription_id,
            body.quantity,
            body.expires_at,
        )
        .await?;

    Ok(Json(created))
}

#[derive(Debug, Deserialize)]
pub struct AssignBody {
    /// Directory user id (`sp_usr_...`) or an email address to resolve
    pub user_id_or_email: String,
    pub idempotency_key: String,
}

/// POST /companies/{company_id}/licenses/{license_id}/assign
pub async fn assign_license(
    State(state): State<AppState>,
    Path(path): Path<LicensePath>,
    Json(body): Json<AssignBody>,
) -> Result<Json<License>> {
    if body.idempotency_key.is_empty() {
        return Err(AppError::Validation("idempotency_key is required".into()));
    }

    let user = if body.user_id_or_email.contains('@') {
        if !is_valid_email(&body.user_id_or_email) {
            return Err(AppError::Validation(msg::INVALID_EMAIL.into()));
        }
        state.directory.resolve_email(&body.user_id_or_email)?
    } else {
        // Anything that is not an email must be a well-formed directory id.
        if !is_valid_prefixed_id(&body.user_id_or_email) {
            return Err(AppError::Validation(msg::INVALID_USER_ID.into()));
        }
        state
            .directory
            .get_user(&body.user_id_or_email)?
            .or_not_found("User not found in directory")?
    };

    let license = state
        .license_pool()
        .assign(&path.company_id, &path.license_id, &user.id, &body.idempotency_key)
        .await?;

    Ok(Json(license))
}

#[derive(Debug, Deserialize)]
pub struct UnassignBody {
    pub idempotency_key: String,
}

/// POST /companies/{company_id}/licenses/{license_id}/unassign
/// Returns the seat to the pool. Not a revocation.
pub async fn unassign_license(
    State(state): State<AppState>,
    Path(path): Path<LicensePath>,
    Json(body): Json<UnassignBody>,
) -> Result<Json<License>> {
    if body.idempotency_key.is_empty() {
        return Err(AppError::Validation("idempotency_key is required".into()));
    }

    let license = state
        .license_pool()
        .unassign(&path.company_id, &path.license_id, &body.idempotency_key)
        .await?;

    Ok(Json(license))
}

/// POST /companies/{company_id}/licenses/{license_id}/suspend
pub async fn suspend_license(
    State(state): State<AppState>,
    Path(path): Path<LicensePath>,
) -> Result<Json<License>> {
    let license = state
        .license_pool()
        .suspend(&path.company_id, &path.license_id)
        .await?;
    Ok(Json(license))
}

/// POST /companies/{company_id}/licenses/{license_id}/reactivate
pub async fn reactivate_license(
    State(state): State<AppState>,
    Path(path): Path<LicensePath>,
) -> Result<Json<License>> {
    let license = state
        .license_pool()
        .reactivate(&path.company_id, &path.license_id)
        .await?;
    Ok(Json(license))
}

/// POST /companies/{company_id}/licenses/{license_id}/revoke
/// Terminal and irreversible; use unassign to merely return a seat.
pub async fn revoke_license(
    State(state): State<AppState>,
    Path(path): Path<LicensePath>,
) -> Result<Json<License>> {
    let license = state
        .license_pool()
        .force_revoke(&path.company_id, &path.license_id)
        .await?;
    Ok(Json(license))
}

/// GET /companies/{company_id}/licenses
/// Server-side filtered, paginated list.
pub async fn list_licenses(
    State(state): State<AppState>,
    Path(path): Path<CompanyPath>,
    Query(filter): Query<LicenseFilter>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<Paginated<License>>> {
    let conn = state.db.get()?;

    let (licenses, total) = queries::list_licenses_for_company_paginated(
        &conn,
        &path.company_id,
        &filter,
        page.limit(),
        page.offset(),
    )?;

    Ok(Json(Paginated::page(licenses, total, &page)))
}

/// GET /companies/{company_id}/licenses/{license_id}
pub async fn get_license(
    State(state): State<AppState>,
    Path(path): Path<LicensePath>,
) -> Result<Json<License>> {
    let conn = state.db.get()?;

    let license = queries::get_license_by_id(&conn, &path.license_id)?
        .or_not_found(msg::LICENSE_NOT_FOUND)?;
    if license.company_id != path.company_id {
        return Err(AppError::NotFound(msg::LICENSE_NOT_FOUND.into()));
    }

    Ok(Json(license))
}

/// GET /companies/{company_id}/licenses/export
/// CSV download of every license for the company.
pub async fn export_licenses(
    State(state): State<AppState>,
    Path(path): Path<CompanyPath>,
) -> Result<Response> {
    let conn = state.db.get()?;
    let licenses = queries::list_licenses_for_company(&conn, &path.company_id)?;

    let mut users = HashMap::new();
    for license in &licenses {
        if let Some(user_id) = &license.assigned_user_id {
            if !users.contains_key(user_id) {
                if let Some(user) = state.directory.get_user(user_id)? {
                    users.insert(user_id.clone(), user);
                }
            }
        }
    }

    let csv = licenses_to_csv(&licenses, &users);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"licenses.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}
