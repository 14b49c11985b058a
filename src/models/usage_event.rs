use serde::{Deserialize, Serialize};

/// One usage event for a license. Append-only; owned by the usage recorder
/// and never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    pub id: String,
    pub license_id: String,
    pub company_id: String,
    pub user_id: Option<String>,
    /// Free-form activity label (e.g. "course_started", "login")
    pub activity: String,
    pub timestamp: i64,
    /// Client metadata as JSON (ip, user agent, ...), opaque to the engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_meta: Option<String>,
}

/// Input for recording a usage event.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordUsage {
    pub license_id: String,
    pub company_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub activity: String,
    #[serde(default)]
    pub client_meta: Option<String>,
}
