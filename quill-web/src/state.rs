//! Shared application state

use crate::{session, WebResult};
use quill_core::QuillConfig;
use quill_models::{Database, Role, Session, TokenCodec, User};
use std::sync::Arc;
use tracing::info;

/// State handed to every request
#[derive(Debug, Clone)]
pub struct AppState {
    /// Configuration
    pub config: Arc<QuillConfig>,
    pub db: Database,
    /// Signs session and confirmation tokens with the configured secret
    pub tokens: TokenCodec,
}

impl AppState {
    /// Connect to the configured database, create the schema and reconcile
    /// the role catalog
    pub async fn new(config: QuillConfig) -> WebResult<Self> {
        config.validate()?;

        let db = Database::connect(&config.database_url).await?;
        db.migrate().await?;
        Role::update_permit(&mut db.session()).await?;

        let tokens = TokenCodec::from_config(&config);
        let state = Self {
            config: Arc::new(config),
            db,
            tokens,
        };

        info!("Application state initialized successfully");
        Ok(state)
    }

    /// Open a unit of work for the current request
    pub fn session(&self) -> Session {
        self.db.session()
    }

    /// Session token for `user` with the configured lifetime
    pub fn issue_session_token(&self, user: &User) -> WebResult<String> {
        let token = session::issue_session_token(&self.tokens, user, self.config.token_ttl())?;
        Ok(token)
    }

    pub fn admin_email(&self) -> Option<&str> {
        self.config.admin_email.as_deref()
    }
}
