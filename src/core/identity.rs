//! Authenticated caller identity.
//!
//! Token verification happens outside this crate; callers hand in the resolved
//! identity and every operation decides what that identity may do.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};

/// Role attached to an authenticated user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Buys tickets
    User,
    /// Creates and runs events
    Organizer,
    /// Platform operator
    Admin,
}

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthIdentity {
    /// Stable user id
    pub user_id: String,
    /// Role granted at login
    pub role: Role,
}

impl AuthIdentity {
    /// Creates an identity.
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    /// Whether this identity is a platform admin.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    /// Only plain users may hold carts and buy tickets.
    ///
    /// # Errors
    /// Returns [`Error::Forbidden`] for organizers and admins.
    pub fn require_buyer(&self) -> Result<()> {
        match self.role {
            Role::User => Ok(()),
            Role::Organizer => Err(Error::Forbidden {
                message: "organizers cannot buy tickets".to_string(),
            }),
            Role::Admin => Err(Error::Forbidden {
                message: "admins cannot buy tickets".to_string(),
            }),
        }
    }

    /// Organizers (and admins) may create events.
    ///
    /// # Errors
    /// Returns [`Error::Forbidden`] for plain users.
    pub fn require_organizer(&self) -> Result<()> {
        match self.role {
            Role::Organizer | Role::Admin => Ok(()),
            Role::User => Err(Error::Forbidden {
                message: "only organizers can manage events".to_string(),
            }),
        }
    }

    /// The owner of a resource, or an admin, may manage it.
    ///
    /// # Errors
    /// Returns [`Error::Forbidden`] when neither holds.
    pub fn require_owner_or_admin(&self, owner_id: &str) -> Result<()> {
        if self.is_admin() || self.user_id == owner_id {
            Ok(())
        } else {
            Err(Error::Forbidden {
                message: format!("user {} does not manage this resource", self.user_id),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_users_can_buy() {
        assert!(AuthIdentity::new("u", Role::User).require_buyer().is_ok());
        assert!(matches!(
            AuthIdentity::new("o", Role::Organizer).require_buyer(),
            Err(Error::Forbidden { .. })
        ));
        assert!(matches!(
            AuthIdentity::new("a", Role::Admin).require_buyer(),
            Err(Error::Forbidden { .. })
        ));
    }

    #[test]
    fn test_owner_or_admin() {
        let owner = AuthIdentity::new("org-1", Role::Organizer);
        let other = AuthIdentity::new("org-2", Role::Organizer);
        let admin = AuthIdentity::new("admin-1", Role::Admin);

        assert!(owner.require_owner_or_admin("org-1").is_ok());
        assert!(other.require_owner_or_admin("org-1").is_err());
        assert!(admin.require_owner_or_admin("org-1").is_ok());
    }
}
