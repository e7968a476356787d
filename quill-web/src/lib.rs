//! Quill Web - axum integration for the Quill models
//!
//! Resolves the caller's [`Identity`](quill_models::Identity) from a bearer
//! session token and guards handlers by permit, answering 403 when the
//! identity falls short.

pub mod guard;
pub mod session;
pub mod state;

// Re-export main types
pub use guard::{
    authorize, permits, require_admin_permit, require_permit, AdminUser, CurrentIdentity,
    PermissionDenied, RequirePermit, RequiredPermit,
};
pub use session::{bearer_token, identify, issue_session_token, resolve_identity};
pub use state::AppState;

use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Response},
    Router,
};
use quill_core::QuillError;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Wrap `routes` with identity resolution and request tracing.
///
/// Guards added inside `routes` see the identity resolved here.
pub fn create_app(routes: Router<AppState>, state: AppState) -> Router {
    routes
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::resolve_identity,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error types for the web layer
#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error(transparent)]
    Models(#[from] QuillError),
}

/// Result type for web operations
pub type WebResult<T> = Result<T, WebError>;

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            WebError::Models(QuillError::NotFound { .. }) => (StatusCode::NOT_FOUND, "not_found"),
            WebError::Models(QuillError::Validation { .. }) => {
                (StatusCode::BAD_REQUEST, "validation_error")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (
            status,
            Json(json!({
                "error": code,
                "message": message,
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use quill_core::{not_found_error, storage_error};

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_maps_to_404() {
        let response = WebError::from(not_found_error!("user 42", "user")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "not_found");
    }

    #[tokio::test]
    async fn test_storage_error_hides_details() {
        let response = WebError::from(storage_error!("disk is on fire", "store")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["message"], "Internal server error");
    }
}
