mod bulk;
mod license;
mod stats;
mod usage_event;
mod user;

pub use bulk::{BulkAssignRequest, BulkAssignResponse, BulkItemResult, BulkOutcome, BulkSummary};
pub use license::{CreateLicenses, License, LicenseFilter, LicenseStatus};
pub use stats::CompanyStats;
pub use usage_event::{RecordUsage, UsageEvent};
pub use user::DirectoryUser;
