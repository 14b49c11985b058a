//! User directory seam.
//!
//! The engine never owns user identity; it resolves an email address to a
//! user through this trait. The bundled implementation is backed by the
//! local `users` table and creates a pending-invite placeholder for unknown
//! addresses, which is what the surrounding product does when an admin
//! assigns a seat to someone who has not signed up yet.

use crate::db::DbPool;
use crate::error::{AppError, Result};
use crate::models::DirectoryUser;

/// Resolve an email address to a user identity.
pub trait UserDirectory: Send + Sync {
    /// Resolve `email` to a user, creating a pending-invite placeholder if
    /// the directory allows it. Failures map to the resolution error kind
    /// and are terminal for the one command/batch item that needed them.
    fn resolve_email(&self, email: &str) -> Result<DirectoryUser>;

    /// Look up a user by id without creating anything.
    fn get_user(&self, user_id: &str) -> Result<Option<DirectoryUser>>;
}

/// Minimal structural email check. Full deliverability is the invite
/// pipeline's problem; this only rejects obviously malformed input before
/// any mutation happens.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}

/// Directory backed by the local `users` table.
pub struct SqliteDirectory {
    pool: DbPool,
}

impl SqliteDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl UserDirectory for SqliteDirectory {
    fn resolve_email(&self, email: &str) -> Result<DirectoryUser> {
        let conn = self
            .pool
            .get()
            .map_err(|e| AppError::Resolution(format!("directory unavailable: {}", e)))?;

        if let Some(user) = crate::db::queries::get_user_by_email(&conn, email)? {
            return Ok(user);
        }

        // Unknown address: create the placeholder the invite flow fills in.
        let user = crate::db::queries::create_user(&conn, email, None, true)?;
        tracing::debug!("created pending-invite user {} for {}", user.id, email);
        Ok(user)
    }

    fn get_user(&self, user_id: &str) -> Result<Option<DirectoryUser>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| AppError::Resolution(format!("directory unavailable: {}", e)))?;
        crate::db::queries::get_user_by_id(&conn, user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));

        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("a@"));
        assert!(!is_valid_email("a@nodot"));
        assert!(!is_valid_email("a@.com"));
        assert!(!is_valid_email("a@x.com."));
        assert!(!is_valid_email("a b@x.com"));
    }
}
