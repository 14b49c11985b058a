pub mod bulk;
pub mod licenses;
pub mod stats;
pub mod usage;

use axum::routing::{get, post};
use axum::Router;

use crate::db::AppState;

/// Build the full command/query router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/companies/{company_id}/licenses",
            post(licenses::create_licenses).get(licenses::list_licenses),
        )
        .route(
            "/companies/{company_id}/licenses/bulk-assign",
            post(bulk::bulk_assign_licenses),
        )
        .route(
            "/companies/{company_id}/licenses/{license_id}/assign",
            post(licenses::assign_license),
        )
        .route(
            "/companies/{company_id}/licenses/{license_id}/unassign",
            post(licenses::unassign_license),
        )
        .route(
            "/companies/{company_id}/licenses/{license_id}/suspend",
            post(licenses::suspend_license),
        )
        .route(
            "/companies/{company_id}/licenses/{license_id}/reactivate",
            post(licenses::reactivate_license),
        )
        .route(
            "/companies/{company_id}/licenses/{license_id}/revoke",
            post(licenses::revoke_license),
        )
        // Query API
        .route(
            "/companies/{company_id}/licenses/export",
            get(licenses::export_licenses),
        )
        .route(
            "/companies/{company_id}/licenses/{license_id}",
            get(licenses::get_license),
        )
        .route("/companies/{company_id}/stats", get(stats::get_stats))
        .route(
            "/companies/{company_id}/usage",
            get(usage::list_usage).post(usage::record_usage),
        )
}
