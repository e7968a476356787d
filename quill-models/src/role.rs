//! Roles and the static role catalog

use crate::{permit::Permit, store::Session};
use quill_core::QuillResult;
use tracing::info;

pub const USER_ROLE: &str = "User";
pub const ASSISTANT_ROLE: &str = "Assistant";
pub const ADMINISTRATOR_ROLE: &str = "Administrator";

/// A named bundle of permits assignable to users
#[derive(Debug, Clone, PartialEq)]
pub struct Role {
    /// Row id, `None` until the role has been committed
    pub id: Option<i64>,
    pub name: String,
    pub permit: Permit,
    /// Role given to new accounts that are not the administrator
    pub default: bool,
}

/// One entry of the static role catalog
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub permit: Permit,
    pub default: bool,
}

/// The roles every deployment has. Exactly one entry is the default.
pub fn catalog() -> [CatalogEntry; 3] {
    let user = Permit::Follow | Permit::Comment | Permit::WriteArticle;
    [
        CatalogEntry {
            name: USER_ROLE,
            permit: user,
            default: true,
        },
        CatalogEntry {
            name: ASSISTANT_ROLE,
            permit: user | Permit::ManageComment,
            default: false,
        },
        CatalogEntry {
            name: ADMINISTRATOR_ROLE,
            permit: Permit::administrator(),
            default: false,
        },
    ]
}

impl Role {
    /// Create an unsaved role with no permits
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            permit: Permit::from(0u8),
            default: false,
        }
    }

    /// Reconcile the persisted roles with [`catalog`].
    ///
    /// Each catalog role is found by name or created, its mask and default
    /// flag are overwritten, and everything is committed at once.
    pub async fn update_permit(session: &mut Session) -> QuillResult<()> {
        for entry in catalog() {
            let mut role = match session.role_by_name(entry.name).await? {
                Some(role) => role,
                None => Role::new(entry.name),
            };
            role.permit = entry.permit;
            role.default = entry.default;
            session.add(role);
        }
        session.commit().await?;

        info!("Role table reconciled with {} catalog roles", catalog().len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Database;

    #[test]
    fn test_catalog_has_single_default() {
        let defaults: Vec<_> = catalog().iter().filter(|r| r.default).map(|r| r.name).collect();
        assert_eq!(defaults, vec![USER_ROLE]);
    }

    #[test]
    fn test_catalog_masks() {
        let masks: Vec<u8> = catalog().iter().map(|r| r.permit.bits()).collect();
        assert_eq!(masks, vec![0x07, 0x0f, 0xff]);
    }

    #[tokio::test]
    async fn test_update_permit_creates_roles() {
        let db = Database::in_memory().await.unwrap();
        let mut session = db.session();

        Role::update_permit(&mut session).await.unwrap();

        let roles = session.roles().await.unwrap();
        assert_eq!(roles.len(), 3);
        let default = session.default_role().await.unwrap().unwrap();
        assert_eq!(default.name, USER_ROLE);
        assert_eq!(default.permit.bits(), 0x07);
    }

    #[tokio::test]
    async fn test_update_permit_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let mut session = db.session();

        Role::update_permit(&mut session).await.unwrap();
        let first = session.roles().await.unwrap();
        Role::update_permit(&mut session).await.unwrap();
        let second = session.roles().await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_update_permit_repairs_drifted_role() {
        let db = Database::in_memory().await.unwrap();
        let mut session = db.session();
        Role::update_permit(&mut session).await.unwrap();

        let mut assistant = session.role_by_name(ASSISTANT_ROLE).await.unwrap().unwrap();
        assistant.permit = Permit::Follow;
        assistant.default = true;
        session.add(assistant.clone());
        session.commit().await.unwrap();

        Role::update_permit(&mut session).await.unwrap();

        let repaired = session.role_by_name(ASSISTANT_ROLE).await.unwrap().unwrap();
        assert_eq!(repaired.id, assistant.id);
        assert_eq!(repaired.permit.bits(), 0x0f);
        assert!(!repaired.default);
    }
}
