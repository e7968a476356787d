//! Permission guard: middleware and extractors that end a request with 403
//! unless the current identity holds the required permits

use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use futures_util::future::BoxFuture;
use quill_models::{Identity, Permit, User};
use serde_json::json;
use std::{convert::Infallible, marker::PhantomData};
use tracing::{debug, warn};

/// Rejection for a request whose identity lacks a permit
#[derive(Debug)]
pub struct PermissionDenied {
    pub required: Permit,
    pub user_id: Option<i64>,
}

impl PermissionDenied {
    pub fn new(required: Permit, user_id: Option<i64>) -> Self {
        Self { required, user_id }
    }
}

impl IntoResponse for PermissionDenied {
    fn into_response(self) -> Response {
        let names = self.required.names();
        let message = match self.user_id {
            Some(user_id) => format!(
                "User {} does not have required permission: {}",
                user_id,
                names.join(", ")
            ),
            None => format!("Required permission: {}", names.join(", ")),
        };

        (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "permission_denied",
                "message": message,
                "required_permission": names,
                "user_id": self.user_id
            })),
        )
            .into_response()
    }
}

/// The identity placed in the extensions, Anonymous if there is none
fn identity_of(extensions: &axum::http::Extensions) -> &Identity {
    static ANONYMOUS: Identity = Identity::Anonymous;
    extensions.get::<Identity>().unwrap_or(&ANONYMOUS)
}

/// Check `identity` against `required`
pub fn authorize(identity: &Identity, required: Permit) -> Result<(), PermissionDenied> {
    if identity.check_permit(required) {
        return Ok(());
    }

    let user_id = identity.user().map(|user| user.id);
    match user_id {
        Some(id) => warn!("User {} denied, requires {:?}", id, required.names()),
        None => debug!("Anonymous request denied, requires {:?}", required.names()),
    }
    Err(PermissionDenied::new(required, user_id))
}

async fn enforce(required: Permit, request: Request, next: Next) -> Response {
    let verdict = authorize(identity_of(request.extensions()), required);
    match verdict {
        Ok(()) => next.run(request).await,
        Err(denied) => denied.into_response(),
    }
}

/// Middleware that runs the wrapped handler only if the request's identity
/// holds every bit of `permit`, and answers 403 otherwise.
///
/// ```ignore
/// Router::new()
///     .route("/moderate", post(moderate))
///     .route_layer(middleware::from_fn(require_permit(Permit::ManageComment)))
/// ```
pub fn require_permit(
    permit: Permit,
) -> impl Fn(Request, Next) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static {
    move |request: Request, next: Next| -> BoxFuture<'static, Response> {
        Box::pin(enforce(permit, request, next))
    }
}

/// [`require_permit`] for the admin bit
pub fn require_admin_permit(
) -> impl Fn(Request, Next) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static {
    require_permit(Permit::Admin)
}

/// A permit named at the type level, for [`RequirePermit`]
pub trait RequiredPermit {
    const PERMIT: Permit;
}

/// Marker types for the named permits
pub mod permits {
    use super::RequiredPermit;
    use quill_models::Permit;

    pub struct Follow;
    pub struct Comment;
    pub struct WriteArticle;
    pub struct ManageComment;
    pub struct Admin;

    impl RequiredPermit for Follow {
        const PERMIT: Permit = Permit::Follow;
    }

    impl RequiredPermit for Comment {
        const PERMIT: Permit = Permit::Comment;
    }

    impl RequiredPermit for WriteArticle {
        const PERMIT: Permit = Permit::WriteArticle;
    }

    impl RequiredPermit for ManageComment {
        const PERMIT: Permit = Permit::ManageComment;
    }

    impl RequiredPermit for Admin {
        const PERMIT: Permit = Permit::Admin;
    }
}

/// Extractor form of [`require_permit`]: yields the user if they hold
/// `P::PERMIT`, rejects with [`PermissionDenied`] otherwise.
pub struct RequirePermit<P> {
    pub user: User,
    _permit: PhantomData<fn() -> P>,
}

impl<P> RequirePermit<P> {
    pub fn into_inner(self) -> User {
        self.user
    }
}

impl<S, P> FromRequestParts<S> for RequirePermit<P>
where
    P: RequiredPermit,
    S: Send + Sync,
{
    type Rejection = PermissionDenied;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = identity_of(&parts.extensions);
        authorize(identity, P::PERMIT)?;

        match identity.user() {
            Some(user) => Ok(Self {
                user: user.clone(),
                _permit: PhantomData,
            }),
            None => Err(PermissionDenied::new(P::PERMIT, None)),
        }
    }
}

/// Admin user extractor - requires the admin bit
pub struct AdminUser(pub User);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = PermissionDenied;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        RequirePermit::<permits::Admin>::from_request_parts(parts, state)
            .await
            .map(|guard| AdminUser(guard.into_inner()))
    }
}

/// The request's identity. Never rejects.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentIdentity(identity_of(&parts.extensions).clone()))
    }
}
