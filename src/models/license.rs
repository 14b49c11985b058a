use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Closed license status enum. Every reachable license is in exactly one of
/// these states; transitions go through `pool::LicensePool` only, so no
/// caller can write an unreachable field combination directly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LicenseStatus {
    /// Unassigned, usable; counts as "available".
    Active,
    /// Bound to a user, usable.
    Assigned,
    /// Temporarily disabled; an assignment, if any, is preserved.
    Suspended,
    /// Terminal, time-driven.
    Expired,
    /// Terminal, admin-driven, irreversible.
    Revoked,
}

impl LicenseStatus {
    /// Terminal states have no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired | Self::Revoked)
    }
}

/// One assignable unit of capacity under a company subscription.
///
/// `version`/`updated_at` are exposed to callers only as opaque
/// optimistic-concurrency tokens; callers never interpret them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub id: String,
    pub company_id: String,
    pub subscription_id: String,
    /// Globally unique opaque token (PREFIX-XXXX-XXXX-XXXX-XXXX)
    pub license_key: String,
    pub status: LicenseStatus,
    /// Weak reference into the user directory; the engine does not own
    /// user identity.
    pub assigned_user_id: Option<String>,
    pub assigned_at: Option<i64>,
    pub revoked_at: Option<i64>,
    pub expires_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    pub version: i64,
    pub usage_count: i64,
    pub last_used_at: Option<i64>,
}

impl License {
    /// Whether this license holds a seat for invariant purposes: an
    /// `assigned` license, or a `suspended` one with a preserved
    /// assignment, blocks its user from receiving another seat.
    pub fn holds_seat(&self) -> bool {
        self.assigned_user_id.is_some() && !self.status.is_terminal()
    }
}

/// Input for batch license creation.
#[derive(Debug, Deserialize)]
pub struct CreateLicenses {
    pub subscription_id: String,
    pub quantity: i64,
    /// Optional expiry applied to every created license (unix seconds)
    #[serde(default)]
    pub expires_at: Option<i64>,
}

/// Server-side list filters (no fetch-all-then-filter in callers).
#[derive(Debug, Default, Deserialize)]
pub struct LicenseFilter {
    /// Filter by exact status
    pub status: Option<LicenseStatus>,
    /// true = only licenses with an assignment, false = only without
    pub assigned: Option<bool>,
}
