//! Prefixed ID generation for seatpool entities.
//!
//! All IDs use an `sp_` brand prefix so engine identifiers can never be
//! confused with upstream subscription or directory identifiers.
//!
//! Format: `sp_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// All known entity prefixes for validation.
const ALL_PREFIXES: &[&str] = &["sp_co_", "sp_sub_", "sp_lic_", "sp_usr_", "sp_evt_"];

/// Validate that a string is a valid seatpool prefixed ID.
///
/// Cheap check to reject garbage before hitting the database.
/// Validates format: `sp_{entity}_{32_hex_chars}`
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    let hex_part = &s[prefix.len()..];
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Entity types that have prefixed IDs in seatpool.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    Company,
    Subscription,
    License,
    User,
    UsageEvent,
}

impl EntityType {
    /// Returns the prefix for this entity type.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Company => "sp_co",
            Self::Subscription => "sp_sub",
            Self::License => "sp_lic",
            Self::User => "sp_usr",
            Self::UsageEvent => "sp_evt",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_format() {
        let id = EntityType::License.gen_id();
        assert!(id.starts_with("sp_lic_"));
        // sp_lic_ (7 chars) + 32 hex chars = 39 chars total
        assert_eq!(id.len(), 39);
    }

    #[test]
    fn test_ids_are_unique() {
        let id1 = EntityType::License.gen_id();
        let id2 = EntityType::License.gen_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_is_valid_prefixed_id() {
        assert!(is_valid_prefixed_id("sp_lic_a1b2c3d4e5f6789012345678901234ab"));
        assert!(is_valid_prefixed_id("sp_usr_00000000000000000000000000000000"));
        assert!(is_valid_prefixed_id(&EntityType::Company.gen_id()));
        assert!(is_valid_prefixed_id(&EntityType::UsageEvent.gen_id()));

        assert!(!is_valid_prefixed_id(""));
        assert!(!is_valid_prefixed_id("a1b2c3d4-e5f6-7890-1234-567890123456")); // plain UUID
        assert!(!is_valid_prefixed_id("sp_unknown_a1b2c3d4e5f6789012345678901234ab"));
        assert!(!is_valid_prefixed_id("sp_lic_a1b2c3d4")); // too short
        assert!(!is_valid_prefixed_id("sp_lic_a1b2c3d4e5f6789012345678901234gg")); // non-hex
        assert!(!is_valid_prefixed_id("lic_a1b2c3d4e5f6789012345678901234ab")); // missing sp_
    }
}
