//! User accounts

use crate::{
    permit::Permit,
    role::{Role, ADMINISTRATOR_ROLE},
    store::{Change, Session, UserField},
    token::TokenCodec,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use quill_core::{not_found_error, validation_error, ErrorContext, QuillError, QuillResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const GRAVATAR_BASE_URL: &str = "http://www.gravatar.com/avatar";
pub const DEFAULT_AVATAR_SIZE: u32 = 80;
pub const DEFAULT_AVATAR_KIND: &str = "retro";

/// Payload of an email-confirmation token
#[derive(Debug, Serialize, Deserialize)]
struct ConfirmPayload {
    num: i64,
}

/// A registered account with its role loaded
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub name: Option<String>,
    pub(crate) password_hash: Option<String>,
    pub confirmed: bool,
    pub location: Option<String>,
    pub about_me: Option<String>,
    pub member_since: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// MD5 of the email, computed on first avatar request
    pub avatar_hash: Option<String>,
    pub role: Option<Role>,
}

impl User {
    /// Stage `new_user` with its role resolved, commit, and return the stored
    /// account.
    pub async fn register(
        session: &mut Session,
        admin_email: Option<&str>,
        mut new_user: NewUser,
    ) -> QuillResult<User> {
        if new_user.email.is_empty() {
            return Err(validation_error!("email is required", "email", "user"));
        }
        if new_user.username.is_empty() {
            return Err(validation_error!("username is required", "username", "user"));
        }

        new_user.assign_role(session, admin_email).await?;
        let email = new_user.email.clone();
        session.add(new_user);
        session.commit().await?;

        let user = session
            .user_by_email(&email)
            .await?
            .ok_or_else(|| not_found_error!(format!("user {}", email), "user"))?;

        info!("Registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// The password is write-only, so this always fails.
    pub fn password(&self) -> QuillResult<String> {
        Err(QuillError::PasswordNotReadable)
    }

    /// Replace the stored hash with a freshly salted hash of `password`
    pub fn set_password(&mut self, password: &str) -> QuillResult<()> {
        self.password_hash = Some(hash_password(password)?);
        Ok(())
    }

    pub fn password_hash(&self) -> Option<&str> {
        self.password_hash.as_deref()
    }

    /// Verify `password` against the stored hash
    pub fn check_password(&self, password: &str) -> bool {
        match &self.password_hash {
            Some(hash) => verify_password(password, hash),
            None => false,
        }
    }

    /// Signed token proving control of this account, valid for `ttl`
    pub fn make_confirm_token(&self, codec: &TokenCodec, ttl: Duration) -> QuillResult<String> {
        codec.dumps(&ConfirmPayload { num: self.id }, ttl)
    }

    /// Confirm the account if `token` was issued for it.
    ///
    /// A token for another account, or one that fails to decode, returns
    /// false and leaves the user untouched. Confirming twice succeeds.
    pub fn check_token(&mut self, codec: &TokenCodec, token: &str, session: &mut Session) -> bool {
        if Self::token2id(codec, token) != Some(self.id) {
            debug!("Confirmation token does not belong to user {}", self.id);
            return false;
        }

        self.confirmed = true;
        session.add(Change::update_user(self.id, UserField::Confirmed(true)));
        true
    }

    /// User id carried by a confirmation token, or `None` if the token is
    /// malformed, expired or badly signed.
    pub fn token2id(codec: &TokenCodec, token: &str) -> Option<i64> {
        codec
            .loads::<ConfirmPayload>(token)
            .map(|payload| payload.num)
    }

    /// Whether this user's role grants every bit of `permit`
    pub fn check_permit(&self, permit: Permit) -> bool {
        self.role
            .as_ref()
            .is_some_and(|role| role.permit.grants(permit))
    }

    pub fn is_administrator(&self) -> bool {
        self.check_permit(Permit::Admin)
    }

    pub fn role_id(&self) -> Option<i64> {
        self.role.as_ref().and_then(|role| role.id)
    }

    pub fn update_last_seen(&mut self, session: &mut Session) {
        self.last_seen = Utc::now();
        session.add(Change::update_user(self.id, UserField::LastSeen(self.last_seen)));
    }

    /// Gravatar URL for this account.
    ///
    /// The email hash is computed once and cached in `avatar_hash`; later
    /// calls reuse it even if the email has changed since.
    pub fn make_gravatar_url(&mut self, session: &mut Session, size: u32, kind: &str) -> String {
        let hash = match &self.avatar_hash {
            Some(hash) => hash.clone(),
            None => {
                let hash = email_hash(&self.email);
                self.avatar_hash = Some(hash.clone());
                session.add(Change::update_user(self.id, UserField::AvatarHash(hash.clone())));
                hash
            }
        };

        format!("{}/{}?s={}&d={}", GRAVATAR_BASE_URL, hash, size, kind)
    }

    /// [`make_gravatar_url`](Self::make_gravatar_url) with the default size and kind
    pub fn gravatar_url(&mut self, session: &mut Session) -> String {
        self.make_gravatar_url(session, DEFAULT_AVATAR_SIZE, DEFAULT_AVATAR_KIND)
    }
}

/// An account that has not been stored yet
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub name: Option<String>,
    pub(crate) password_hash: Option<String>,
    pub confirmed: bool,
    pub location: Option<String>,
    pub about_me: Option<String>,
    pub member_since: DateTime<Utc>,
    pub role_id: Option<i64>,
}

impl NewUser {
    pub fn new(email: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            username: username.into(),
            name: None,
            password_hash: None,
            confirmed: false,
            location: None,
            about_me: None,
            member_since: Utc::now(),
            role_id: None,
        }
    }

    /// Hash and set the password
    pub fn with_password(mut self, password: &str) -> QuillResult<Self> {
        self.password_hash = Some(hash_password(password)?);
        Ok(self)
    }

    pub(crate) fn with_password_hash(mut self, hash: String) -> Self {
        self.password_hash = Some(hash);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_about_me(mut self, about_me: impl Into<String>) -> Self {
        self.about_me = Some(about_me.into());
        self
    }

    pub fn confirmed(mut self, confirmed: bool) -> Self {
        self.confirmed = confirmed;
        self
    }

    pub fn member_since(mut self, member_since: DateTime<Utc>) -> Self {
        self.member_since = member_since;
        self
    }

    /// Pin the role instead of letting [`assign_role`](Self::assign_role) pick one
    pub fn with_role(mut self, role: &Role) -> Self {
        self.role_id = role.id;
        self
    }

    /// Pick the role if none was pinned: Administrator for `admin_email`,
    /// otherwise the default role. Stays unset if those roles are missing.
    pub async fn assign_role(
        &mut self,
        session: &Session,
        admin_email: Option<&str>,
    ) -> QuillResult<()> {
        if self.role_id.is_some() {
            return Ok(());
        }

        let role = if admin_email == Some(self.email.as_str()) {
            session.role_by_name(ADMINISTRATOR_ROLE).await?
        } else {
            session.default_role().await?
        };
        self.role_id = role.and_then(|role| role.id);
        Ok(())
    }
}

fn email_hash(email: &str) -> String {
    format!("{:x}", md5::compute(email.as_bytes()))
}

/// Hash password using Argon2
pub(crate) fn hash_password(password: &str) -> QuillResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| QuillError::Internal {
            message: format!("Failed to hash password: {}", e),
            source: None,
            context: ErrorContext::new("user").with_operation("hash_password"),
        })
}

/// Verify password against hash
fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}
