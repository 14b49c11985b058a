use axum::{
    extract::{Path, State},
    Json,
};

use crate::db::{queries, AppState};
use crate::error::Result;
use crate::models::CompanyStats;

use super::licenses::CompanyPath;

/// GET /companies/{company_id}/stats
/// One consistent snapshot of the company's seat counts and utilization.
pub async fn get_stats(
    State(state): State<AppState>,
    Path(path): Path<CompanyPath>,
) -> Result<Json<CompanyStats>> {
    let conn = state.db.get()?;
    let stats = queries::company_stats(&conn, &path.company_id)?;
    Ok(Json(stats))
}
