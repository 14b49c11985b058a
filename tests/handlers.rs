//! Handler-level tests: request shape validation and the shared page
//! window, exercised by calling the extractor-based handlers directly.

mod common;

use axum::extract::{Path, Query, State};
use axum::Json;

use common::*;
use seatpool::error::AppError;
use seatpool::handlers::licenses::{assign_license, list_licenses, AssignBody, CompanyPath, LicensePath};
use seatpool::handlers::usage::{list_usage, record_usage, ListUsageQuery, RecordUsageBody};
use seatpool::pagination::PaginationQuery;

const COMPANY: &str = "sp_co_test1";

fn company_path() -> Path<CompanyPath> {
    Path(CompanyPath {
        company_id: COMPANY.to_string(),
    })
}

fn license_path(license_id: &str) -> Path<LicensePath> {
    Path(LicensePath {
        company_id: COMPANY.to_string(),
        license_id: license_id.to_string(),
    })
}

#[tokio::test]
async fn test_assign_rejects_malformed_user_id() {
    let db = TestDb::new();
    let usage_db = TestDb::new_usage();
    let state = test_state(&db, &usage_db);
    let license = state
        .license_pool()
        .create(COMPANY, "sp_sub_test", 1, None)
        .await
        .unwrap()
        .remove(0);

    // No '@', so it must be a well-formed directory id.
    let err = assign_license(
        State(state),
        license_path(&license.id),
        Json(AssignBody {
            user_id_or_email: "alice".to_string(),
            idempotency_key: "k1".to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // Rejected before any mutation.
    let conn = db.conn();
    let current = queries::get_license_by_id(&conn, &license.id).unwrap().unwrap();
    assert_eq!(current.status, LicenseStatus::Active);
}

#[tokio::test]
async fn test_assign_accepts_well_formed_user_id() {
    let db = TestDb::new();
    let usage_db = TestDb::new_usage();
    let state = test_state(&db, &usage_db);
    let license = state
        .license_pool()
        .create(COMPANY, "sp_sub_test", 1, None)
        .await
        .unwrap()
        .remove(0);
    let user = {
        let conn = db.conn();
        create_test_user(&conn, "alice@x.com", "Alice")
    };

    let Json(assigned) = assign_license(
        State(state),
        license_path(&license.id),
        Json(AssignBody {
            user_id_or_email: user.id.clone(),
            idempotency_key: "k1".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(assigned.assigned_user_id, Some(user.id));
}

#[tokio::test]
async fn test_record_usage_rejects_malformed_license_id() {
    let db = TestDb::new();
    let usage_db = TestDb::new_usage();
    let state = test_state(&db, &usage_db);

    let err = record_usage(
        State(state),
        company_path(),
        Json(RecordUsageBody {
            license_id: "not-a-license-id".to_string(),
            user_id: None,
            activity: "login".to_string(),
            client_meta: None,
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_list_licenses_clamps_page_window() {
    let db = TestDb::new();
    let usage_db = TestDb::new_usage();
    let state = test_state(&db, &usage_db);
    state
        .license_pool()
        .create(COMPANY, "sp_sub_test", 3, None)
        .await
        .unwrap();

    let Json(page) = list_licenses(
        State(state),
        company_path(),
        Query(LicenseFilter::default()),
        Query(PaginationQuery {
            limit: Some(500),
            offset: Some(-5),
        }),
    )
    .await
    .unwrap();

    // The response echoes the clamped window, not the raw request.
    assert_eq!(page.limit, 100);
    assert_eq!(page.offset, 0);
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 3);
}

#[tokio::test]
async fn test_list_usage_uses_shared_page_window() {
    let db = TestDb::new();
    let usage_db = TestDb::new_usage();
    let state = test_state(&db, &usage_db);

    let Json(page) = list_usage(
        State(state),
        company_path(),
        Query(ListUsageQuery::default()),
        Query(PaginationQuery {
            limit: None,
            offset: None,
        }),
    )
    .await
    .unwrap();

    assert_eq!(page.limit, 50);
    assert_eq!(page.offset, 0);
    assert_eq!(page.total, 0);
}
