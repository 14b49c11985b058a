//! CSV export of a company's licenses.
//!
//! Fixed column order consumed by the dashboard download:
//! `LicenseKey,Status,AssignedUser,Email,AssignedDate,LastUsed,UsageCount`.
//! Fields containing commas, quotes or newlines are quoted with doubled
//! inner quotes, per standard CSV quoting rules.

use std::collections::HashMap;

use chrono::{TimeZone, Utc};

use crate::models::{DirectoryUser, License};

pub const CSV_HEADER: &str = "LicenseKey,Status,AssignedUser,Email,AssignedDate,LastUsed,UsageCount";

/// Quote a field if it contains a comma, quote or newline.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn format_timestamp(ts: Option<i64>) -> String {
    match ts.and_then(|t| Utc.timestamp_opt(t, 0).single()) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        None => String::new(),
    }
}

/// Render licenses as CSV. `users` maps assigned user ids to their
/// directory records; unknown assignees render with empty name/email.
pub fn licenses_to_csv(licenses: &[License], users: &HashMap<String, DirectoryUser>) -> String {
    let mut out = String::with_capacity(64 * (licenses.len() + 1));
    out.push_str(CSV_HEADER);
    out.push('\n');

    for license in licenses {
        let user = license
            .assigned_user_id
            .as_ref()
            .and_then(|id| users.get(id));
        let name = user.and_then(|u| u.name.as_deref()).unwrap_or("");
        let email = user.map(|u| u.email.as_str()).unwrap_or("");

        out.push_str(&csv_field(&license.license_key));
        out.push(',');
        out.push_str(&csv_field(&license.status.to_string()));
        out.push(',');
        out.push_str(&csv_field(name));
        out.push(',');
        out.push_str(&csv_field(email));
        out.push(',');
        out.push_str(&csv_field(&format_timestamp(license.assigned_at)));
        out.push(',');
        out.push_str(&csv_field(&format_timestamp(license.last_used_at)));
        out.push(',');
        out.push_str(&license.usage_count.to_string());
        out.push('\n');
    }

    out
}
