//! CSV export tests over real store rows.

mod common;

use std::collections::HashMap;

use common::*;
use seatpool::db::queries::list_licenses_for_company;
use seatpool::export::{licenses_to_csv, CSV_HEADER};

const COMPANY: &str = "sp_co_test1";

/// Minimal CSV line splitter honoring quoted fields with doubled quotes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
            }
            other => field.push(other),
        }
    }
    fields.push(field);
    fields
}

#[tokio::test]
async fn test_export_one_row_per_license() {
    let db = TestDb::new();
    let pool = test_license_pool(&db);
    pool.create(COMPANY, "sp_sub_test", 4, None).await.unwrap();

    let conn = db.conn();
    let licenses = list_licenses_for_company(&conn, COMPANY).unwrap();
    let csv = licenses_to_csv(&licenses, &HashMap::new());

    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], CSV_HEADER);

    for (line, license) in lines[1..].iter().zip(&licenses) {
        let fields = split_csv_line(line);
        assert_eq!(fields.len(), 7);
        assert_eq!(fields[0], license.license_key);
        assert_eq!(fields[1], "active");
        assert_eq!(fields[2], "");
        assert_eq!(fields[3], "");
        assert_eq!(fields[6], "0");
    }
}

#[tokio::test]
async fn test_export_includes_assignee_details() {
    let db = TestDb::new();
    let pool = test_license_pool(&db);
    let license = pool.create(COMPANY, "sp_sub_test", 1, None).await.unwrap().remove(0);

    let user = {
        let conn = db.conn();
        create_test_user(&conn, "jane@x.com", "Smith, Jane")
    };
    pool.assign(COMPANY, &license.id, &user.id, "k1").await.unwrap();

    let conn = db.conn();
    let licenses = list_licenses_for_company(&conn, COMPANY).unwrap();
    let mut users = HashMap::new();
    users.insert(user.id.clone(), user);
    let csv = licenses_to_csv(&licenses, &users);

    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 2);

    // The comma in the name must survive quoting.
    let fields = split_csv_line(lines[1]);
    assert_eq!(fields.len(), 7);
    assert_eq!(fields[1], "assigned");
    assert_eq!(fields[2], "Smith, Jane");
    assert_eq!(fields[3], "jane@x.com");
    assert!(fields[4].ends_with('Z'), "assigned date rendered as UTC");
}

#[tokio::test]
async fn test_export_unknown_assignee_renders_empty() {
    let db = TestDb::new();
    let pool = test_license_pool(&db);
    let license = pool.create(COMPANY, "sp_sub_test", 1, None).await.unwrap().remove(0);
    pool.assign(COMPANY, &license.id, "sp_usr_ghost", "k1").await.unwrap();

    let conn = db.conn();
    let licenses = list_licenses_for_company(&conn, COMPANY).unwrap();
    let csv = licenses_to_csv(&licenses, &HashMap::new());

    let fields = split_csv_line(csv.lines().nth(1).unwrap());
    assert_eq!(fields[1], "assigned");
    assert_eq!(fields[2], "");
    assert_eq!(fields[3], "");
}

#[test]
fn test_export_empty_pool_is_header_only() {
    let csv = licenses_to_csv(&[], &HashMap::new());
    assert_eq!(csv, format!("{}\n", CSV_HEADER));
}
