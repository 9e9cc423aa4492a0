//! The single authorization predicate every operation goes through.

use tracing::warn;

use crate::error::AppError;
use crate::middleware::Session;

/// What an operation demands of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Exactly the owning user; admins get no bypass.
    Owner(i64),
    /// The owning user, or any admin-tier role.
    OwnerOrAdmin(i64),
    /// Role ∈ {admin, super_admin}.
    Admin,
    /// Role == super_admin.
    SuperAdmin,
}

impl Session {
    pub fn can(&self, capability: Capability) -> bool {
        match capability {
            Capability::Owner(owner_id) => self.user_id == owner_id,
            Capability::OwnerOrAdmin(owner_id) => self.user_id == owner_id || self.role.is_admin(),
            Capability::Admin => self.role.is_admin(),
            Capability::SuperAdmin => self.role.is_super_admin(),
        }
    }
}

pub fn require(session: &Session, capability: Capability) -> Result<(), AppError> {
    if session.can(capability) {
        Ok(())
    } else {
        warn!(
            "User {} ({}) denied {:?}",
            session.username, session.role, capability
        );
        Err(AppError::AuthorizationDenied)
    }
}

#[cfg(test)]
pub(crate) fn session_for(user_id: i64, role: quill_types::models::Role) -> Session {
    Session {
        id: format!("test-{user_id}"),
        user_id,
        username: format!("user{user_id}"),
        role,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_types::models::Role;

    #[test]
    fn owner_only_has_no_admin_bypass() {
        assert!(session_for(1, Role::Reader).can(Capability::Owner(1)));
        assert!(!session_for(2, Role::Admin).can(Capability::Owner(1)));
        assert!(!session_for(2, Role::SuperAdmin).can(Capability::Owner(1)));
    }

    #[test]
    fn owner_or_admin() {
        assert!(session_for(1, Role::Reader).can(Capability::OwnerOrAdmin(1)));
        assert!(!session_for(2, Role::Reader).can(Capability::OwnerOrAdmin(1)));
        assert!(session_for(2, Role::Admin).can(Capability::OwnerOrAdmin(1)));
        assert!(session_for(2, Role::SuperAdmin).can(Capability::OwnerOrAdmin(1)));
    }

    #[test]
    fn super_admin_is_stricter_than_admin() {
        assert!(session_for(1, Role::Admin).can(Capability::Admin));
        assert!(!session_for(1, Role::Admin).can(Capability::SuperAdmin));
        assert!(session_for(1, Role::SuperAdmin).can(Capability::SuperAdmin));
        assert!(matches!(
            require(&session_for(1, Role::Reader), Capability::Admin),
            Err(AppError::AuthorizationDenied)
        ));
    }
}
