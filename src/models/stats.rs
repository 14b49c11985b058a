use serde::{Deserialize, Serialize};

/// Aggregate license statistics for one company, computed from a single
/// consistent snapshot of the store (one GROUP BY statement, never
/// independent per-field reads).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompanyStats {
    pub total: i64,
    /// Unassigned, usable seats
    pub active: i64,
    pub assigned: i64,
    pub suspended: i64,
    pub expired: i64,
    pub revoked: i64,
    /// Seats that can be handed out right now (= active)
    pub available: i64,
    /// assigned / (total - expired - revoked) as a percentage,
    /// rounded to one decimal; 0.0 when there are no non-terminal seats
    pub utilization_rate: f64,
}
