//! Unified error handling
//!
//! Structured error types with context and proper error chaining

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

pub type QuillResult<T> = Result<T, QuillError>;

/// Error context providing additional information for debugging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main error type for Quill
#[derive(Error, Debug)]
pub enum QuillError {
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    #[error("Resource not found: {resource}")]
    NotFound {
        resource: String,
        context: ErrorContext,
    },

    /// The password attribute is write-only.
    #[error("password is not a readable attribute")]
    PasswordNotReadable,

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },
}

impl QuillError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            QuillError::Storage { context, .. } => Some(context),
            QuillError::Config { context, .. } => Some(context),
            QuillError::Validation { context, .. } => Some(context),
            QuillError::NotFound { context, .. } => Some(context),
            QuillError::Internal { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            QuillError::Internal { .. } | QuillError::Storage { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Internal error occurred"
                );
            }
            QuillError::Config { .. } | QuillError::Validation { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Configuration or validation error"
                );
            }
            QuillError::NotFound { .. } => {
                debug!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Request-level error"
                );
            }
            _ => {
                warn!(error = %self, "Error occurred");
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! storage_error {
    ($msg:expr, $component:expr) => {
        $crate::QuillError::Storage {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::QuillError::Storage {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component),
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::QuillError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file or QUILL_* environment variables"),
        }
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::QuillError::Validation {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the field value and format"),
        }
    };
}

#[macro_export]
macro_rules! not_found_error {
    ($resource:expr, $component:expr) => {
        $crate::QuillError::NotFound {
            resource: $resource.to_string(),
            context: $crate::ErrorContext::new($component),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_carries_context() {
        let err = storage_error!("insert failed", "store");
        match &err {
            QuillError::Storage {
                message, context, ..
            } => {
                assert_eq!(message, "insert failed");
                assert_eq!(context.component, "store");
                assert!(!context.error_id.is_empty());
            }
            _ => panic!("Expected Storage error"),
        }
        err.log();
    }

    #[test]
    fn test_password_error_has_no_context() {
        let err = QuillError::PasswordNotReadable;
        assert!(err.context().is_none());
        assert_eq!(err.to_string(), "password is not a readable attribute");
    }

    #[test]
    fn test_validation_error_records_field() {
        let err = validation_error!("must not be empty", "email", "user");
        match err {
            QuillError::Validation { field, context, .. } => {
                assert_eq!(field.as_deref(), Some("email"));
                assert_eq!(context.recovery_suggestions.len(), 1);
            }
            _ => panic!("Expected Validation error"),
        }
    }
}
