use crate::{permit::Permit, user::User};

/// Who is making a request
#[derive(Debug, Clone, Default)]
pub enum Identity {
    Authenticated(User),
    /// No valid session. Every permission check fails.
    #[default]
    Anonymous,
}

impl Identity {
    pub fn check_permit(&self, permit: Permit) -> bool {
        match self {
            Identity::Authenticated(user) => user.check_permit(permit),
            Identity::Anonymous => false,
        }
    }

    pub fn is_administrator(&self) -> bool {
        self.check_permit(Permit::Admin)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Authenticated(user) => Some(user),
            Identity::Anonymous => None,
        }
    }

    pub fn into_user(self) -> Option<User> {
        match self {
            Identity::Authenticated(user) => Some(user),
            Identity::Anonymous => None,
        }
    }
}

impl From<User> for Identity {
    fn from(user: User) -> Self {
        Identity::Authenticated(user)
    }
}

impl From<Option<User>> for Identity {
    fn from(user: Option<User>) -> Self {
        user.map(Identity::Authenticated).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{role::Role, store::Database, user::NewUser};

    #[test]
    fn test_anonymous_denies_everything() {
        let anonymous = Identity::default();
        for bits in 0..=u8::MAX {
            assert!(!anonymous.check_permit(Permit::from(bits)));
        }
        assert!(!anonymous.is_administrator());
        assert!(!anonymous.is_authenticated());
        assert!(anonymous.user().is_none());
    }

    #[tokio::test]
    async fn test_authenticated_delegates_to_role() {
        let db = Database::in_memory().await.unwrap();
        let mut session = db.session();
        Role::update_permit(&mut session).await.unwrap();
        let user = User::register(&mut session, None, NewUser::new("ada@example.com", "ada"))
            .await
            .unwrap();

        let identity = Identity::from(Some(user.clone()));
        assert!(identity.is_authenticated());
        assert!(identity.check_permit(Permit::Follow | Permit::Comment));
        assert!(!identity.check_permit(Permit::ManageComment));
        assert!(!identity.is_administrator());
        assert_eq!(identity.into_user().map(|u| u.id), Some(user.id));
    }

    #[test]
    fn test_missing_user_is_anonymous() {
        assert!(matches!(Identity::from(None), Identity::Anonymous));
    }
}
