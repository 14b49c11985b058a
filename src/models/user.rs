use serde::{Deserialize, Serialize};

/// Directory user record. The engine stores these only as resolution
/// results; the directory remains the source of truth for identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    /// True for placeholder users created while their invite is pending
    pub invite_pending: bool,
    pub created_at: i64,
}
