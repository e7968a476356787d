//! Configuration management

use crate::error::{ErrorContext, QuillError, QuillResult};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default confirmation-token lifetime in seconds
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Upper bound on token lifetime, one year
pub const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 3600;

/// Process-wide application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuillConfig {
    /// Key used to sign confirmation and session tokens
    pub secret_key: String,
    /// Accounts registered with this email get the Administrator role
    pub admin_email: Option<String>,
    /// sqlx connection URL
    pub database_url: String,
    /// Default max-age of issued tokens
    pub token_ttl_secs: u64,
    pub logging: LoggingConfig,
}

impl Default for QuillConfig {
    fn default() -> Self {
        Self {
            secret_key: "quill-default-secret-change-in-production".to_string(),
            admin_email: None,
            database_url: "sqlite::memory:".to_string(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            logging: LoggingConfig::default(),
        }
    }
}

impl QuillConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> QuillResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| QuillError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: QuillConfig = toml::from_str(&content).map_err(|e| QuillError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        Ok(config)
    }

    /// Override fields from `QUILL_*` / `DATABASE_URL` environment variables.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn apply_env(mut self) -> QuillResult<Self> {
        dotenvy::dotenv().ok();

        if let Ok(secret) = std::env::var("QUILL_SECRET_KEY") {
            self.secret_key = secret;
        }
        if let Ok(email) = std::env::var("QUILL_ADMIN_EMAIL") {
            self.admin_email = Some(email);
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database_url = url;
        }
        if let Ok(ttl) = std::env::var("QUILL_TOKEN_TTL_SECS") {
            self.token_ttl_secs = ttl.parse().map_err(|e| QuillError::Config {
                message: format!("QUILL_TOKEN_TTL_SECS is not a number: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("config").with_operation("apply_env"),
            })?;
        }

        Ok(self)
    }

    /// Load from an optional file, then apply the environment and validate
    pub fn load(path: Option<&Path>) -> QuillResult<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> QuillResult<()> {
        if self.secret_key.is_empty() {
            return Err(crate::config_error!("secret_key must not be empty", "config"));
        }

        if self.token_ttl_secs == 0 {
            return Err(crate::config_error!(
                "token_ttl_secs must be greater than 0",
                "config"
            ));
        }

        if self.token_ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(crate::config_error!(
                format!("token_ttl_secs must be at most {}", MAX_TOKEN_TTL_SECS),
                "config"
            ));
        }

        if self.database_url.is_empty() {
            return Err(crate::config_error!("database_url must not be empty", "config"));
        }

        Ok(())
    }

    /// Token lifetime as a duration
    pub fn token_ttl(&self) -> chrono::Duration {
        let secs = self.token_ttl_secs.min(MAX_TOKEN_TTL_SECS);
        chrono::Duration::seconds(secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = QuillConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.token_ttl_secs, 3600);
        assert_eq!(config.admin_email, None);
    }

    #[test]
    fn test_from_file_fills_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
secret_key = "s3cret"
admin_email = "boss@example.com"

[logging]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let config = QuillConfig::from_file(file.path()).unwrap();
        assert_eq!(config.secret_key, "s3cret");
        assert_eq!(config.admin_email.as_deref(), Some("boss@example.com"));
        assert_eq!(config.token_ttl_secs, DEFAULT_TOKEN_TTL_SECS);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, crate::LogFormat::Json);
    }

    #[test]
    fn test_validate_rejects_empty_secret() {
        let config = QuillConfig {
            secret_key: String::new(),
            ..QuillConfig::default()
        };
        assert!(matches!(config.validate(), Err(QuillError::Config { .. })));
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let config = QuillConfig {
            token_ttl_secs: 0,
            ..QuillConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_token_ttl_is_bounded() {
        let config = QuillConfig {
            token_ttl_secs: MAX_TOKEN_TTL_SECS + 1,
            ..QuillConfig::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.token_ttl().num_seconds(), MAX_TOKEN_TTL_SECS as i64);
        assert_eq!(QuillConfig::default().token_ttl().num_seconds(), 3600);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = QuillConfig::from_file("/nonexistent/quill.toml").unwrap_err();
        match err {
            QuillError::Config { context, .. } => {
                assert_eq!(context.operation.as_deref(), Some("read_file"));
            }
            other => panic!("Expected Config error, got {other:?}"),
        }
    }
}
