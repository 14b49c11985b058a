use serde::{Deserialize, Serialize};
use strum::Display;

use super::License;

/// Request body for bulk assignment.
#[derive(Debug, Deserialize)]
pub struct BulkAssignRequest {
    pub emails: Vec<String>,
}

/// Per-item outcome of a bulk assignment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BulkOutcome {
    Assigned,
    AlreadyLicensed,
    NoLicenseAvailable,
    InvalidEmail,
    UserResolutionFailed,
}

/// Result for one email in a bulk run. Errors are captured here and never
/// thrown out of the batch.
#[derive(Debug, Clone, Serialize)]
pub struct BulkItemResult {
    /// The email as submitted (original casing of the first occurrence)
    pub email: String,
    pub outcome: BulkOutcome,
    /// Present only for `Assigned`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
    /// Failure detail for the non-assigned outcomes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Batch summary: "N succeeded, M failed" rather than atomic failure.
#[derive(Debug, Clone, Serialize)]
pub struct BulkSummary {
    pub submitted: usize,
    pub assigned: usize,
    pub failed: usize,
    /// True when the run was cancelled before processing every email;
    /// already-applied assignments remain in effect.
    pub cancelled: bool,
}

#[derive(Debug, Serialize)]
pub struct BulkAssignResponse {
    pub items: Vec<BulkItemResult>,
    pub summary: BulkSummary,
}
