/// Authorization checks
///
/// Two rules cover the whole application: admin-only areas, and documents that
/// only their owner (or recipient) may see. Both are pure checks on the
/// [`AuthContext`]; loading the resource is the caller's job.

use uuid::Uuid;

use super::middleware::AuthContext;

/// Authorization error
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// Caller is not an administrator
    #[error("Administrator role required")]
    AdminRequired,

    /// Caller does not own the resource
    #[error("Not authorized to access this resource")]
    NotOwner,
}

/// Requires the caller to be an administrator
pub fn require_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    if !auth.is_admin() {
        return Err(AuthzError::AdminRequired);
    }

    Ok(())
}

/// Requires the caller to be the given owner
///
/// Administrators get no bypass here: they reach user files through the admin
/// routes, which are audited separately.
pub fn require_owner(auth: &AuthContext, owner_id: Uuid) -> Result<(), AuthzError> {
    if auth.user_id != owner_id {
        return Err(AuthzError::NotOwner);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRole;

    #[test]
    fn test_require_admin() {
        let admin = AuthContext::new(Uuid::new_v4(), UserRole::Admin);
        let user = AuthContext::new(Uuid::new_v4(), UserRole::User);

        assert!(require_admin(&admin).is_ok());
        assert!(matches!(require_admin(&user), Err(AuthzError::AdminRequired)));
    }

    #[test]
    fn test_require_owner() {
        let owner = Uuid::new_v4();
        let auth = AuthContext::new(owner, UserRole::User);

        assert!(require_owner(&auth, owner).is_ok());
        assert!(matches!(
            require_owner(&auth, Uuid::new_v4()),
            Err(AuthzError::NotOwner)
        ));
    }

    #[test]
    fn test_admin_is_not_owner_of_foreign_documents() {
        let admin = AuthContext::new(Uuid::new_v4(), UserRole::Admin);
        assert!(require_owner(&admin, Uuid::new_v4()).is_err());
    }
}
