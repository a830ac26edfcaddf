//! Admin impersonation: which user's data a request operates on.

use serde::Deserialize;

use crate::db::User;

/// `?asUserId=` query parameter accepted by the scoped resources
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeQuery {
    pub as_user_id: Option<String>,
}

/// The owner id a request is scoped to.
///
/// An admin supplying a non-empty target acts inside that user's scope.
/// Anyone else, or an admin without a target, acts on their own data; a
/// target passed by a non-admin is ignored.
pub fn effective_owner_id(principal: &User, as_user_id: Option<&str>) -> String {
    match as_user_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(target) if principal.is_admin() => {
            if target != principal.id {
                tracing::debug!(admin_id = %principal.id, target_id = %target, "Admin acting as user");
            }
            target.to_string()
        }
        _ => principal.id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::UserRole;

    fn user(id: &str, role: UserRole) -> User {
        User {
            id: id.to_string(),
            name: id.to_string(),
            email: format!("{}@example.com", id),
            password_hash: String::new(),
            username: None,
            role,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_admin_can_impersonate() {
        let admin = user("admin", UserRole::Admin);
        assert_eq!(effective_owner_id(&admin, Some("u1")), "u1");
        assert_eq!(effective_owner_id(&admin, None), "admin");
        assert_eq!(effective_owner_id(&admin, Some("  ")), "admin");
    }

    #[test]
    fn test_user_target_is_ignored() {
        let plain = user("u2", UserRole::User);
        assert_eq!(effective_owner_id(&plain, Some("u1")), "u2");
        assert_eq!(effective_owner_id(&plain, None), "u2");
    }
}
