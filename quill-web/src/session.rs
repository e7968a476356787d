//! Session tokens and request identity resolution

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Duration;
use quill_core::QuillResult;
use quill_models::{Identity, TokenCodec, User};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Payload of a session token. Its field differs from the confirmation
/// payload so neither token decodes as the other.
#[derive(Debug, Serialize, Deserialize)]
struct SessionPayload {
    uid: i64,
}

/// Sign a bearer token that identifies `user` for `ttl`
pub fn issue_session_token(codec: &TokenCodec, user: &User, ttl: Duration) -> QuillResult<String> {
    codec.dumps(&SessionPayload { uid: user.id }, ttl)
}

/// User id carried by a session token
pub fn session_user_id(codec: &TokenCodec, token: &str) -> Option<i64> {
    codec
        .loads::<SessionPayload>(token)
        .map(|payload| payload.uid)
}

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty())
}

/// Resolve the identity behind `headers`. Anything short of a valid token for
/// an existing user is Anonymous.
pub async fn identify(state: &AppState, headers: &HeaderMap) -> Identity {
    let Some(token) = bearer_token(headers) else {
        return Identity::Anonymous;
    };
    let Some(user_id) = session_user_id(&state.tokens, token) else {
        debug!("Ignoring invalid session token");
        return Identity::Anonymous;
    };

    match state.session().load_user(user_id).await {
        Ok(Some(user)) => Identity::Authenticated(user),
        Ok(None) => {
            debug!("Session token for unknown user {}", user_id);
            Identity::Anonymous
        }
        Err(e) => {
            warn!("Failed to load user {}: {}", user_id, e);
            Identity::Anonymous
        }
    }
}

/// Middleware that places the request's [`Identity`] in its extensions
pub async fn resolve_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = identify(&state, request.headers()).await;
    request.extensions_mut().insert(identity);
    next.run(request).await
}
