//! Shared setup for router tests

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use quill_core::QuillConfig;
use quill_models::{NewUser, User};
use quill_web::AppState;
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "boss@example.com";

/// An in-memory application with one account per catalog role
pub struct TestApp {
    pub state: AppState,
    pub reader: User,
    pub moderator: User,
    pub admin: User,
}

pub async fn spawn_state() -> TestApp {
    let config = QuillConfig {
        secret_key: "router-test-secret".to_string(),
        admin_email: Some(ADMIN_EMAIL.to_string()),
        ..QuillConfig::default()
    };
    let state = AppState::new(config).await.unwrap();

    let mut session = state.session();
    let reader = User::register(
        &mut session,
        state.admin_email(),
        NewUser::new("ada@example.com", "ada"),
    )
    .await
    .unwrap();
    let admin = User::register(
        &mut session,
        state.admin_email(),
        NewUser::new(ADMIN_EMAIL, "boss"),
    )
    .await
    .unwrap();
    let assistant = session
        .role_by_name(quill_models::ASSISTANT_ROLE)
        .await
        .unwrap()
        .unwrap();
    let moderator = User::register(
        &mut session,
        state.admin_email(),
        NewUser::new("mod@example.com", "mod").with_role(&assistant),
    )
    .await
    .unwrap();

    TestApp {
        state,
        reader,
        moderator,
        admin,
    }
}

impl TestApp {
    pub fn token(&self, user: &User) -> String {
        self.state.issue_session_token(user).unwrap()
    }
}

pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> Response {
    let mut request = Request::builder().uri(uri);
    if let Some(token) = token {
        request = request.header(AUTHORIZATION, format!("Bearer {}", token));
    }

    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn status_and_body(response: Response) -> (StatusCode, String) {
    let status = response.status();
    (status, body_string(response).await)
}
