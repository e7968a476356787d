//! End-to-end account flow against a database file

use chrono::Duration;
use quill_models::{
    Database, Identity, NewPost, NewUser, Permit, Post, Role, TokenCodec, User, ADMINISTRATOR_ROLE,
    USER_ROLE,
};

const ADMIN: &str = "boss@example.com";

async fn open(dir: &tempfile::TempDir) -> Database {
    let url = format!("sqlite://{}", dir.path().join("quill.db").display());
    let db = Database::connect(&url).await.unwrap();
    db.migrate().await.unwrap();
    Role::update_permit(&mut db.session()).await.unwrap();
    db
}

#[tokio::test]
async fn test_deploy_is_repeatable_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let first = open(&dir).await.session().roles().await.unwrap();
    let second = open(&dir).await.session().roles().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        first.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
        vec![USER_ROLE, "Assistant", ADMINISTRATOR_ROLE]
    );
}

#[tokio::test]
async fn test_register_confirm_and_post() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir).await;
    let codec = TokenCodec::new(b"integration-secret");

    let mut session = db.session();
    let admin = User::register(&mut session, Some(ADMIN), NewUser::new(ADMIN, "boss"))
        .await
        .unwrap();
    let new_user = NewUser::new("ada@example.com", "ada")
        .with_name("Ada Lovelace")
        .with_password("engine")
        .unwrap();
    let ada = User::register(&mut session, Some(ADMIN), new_user)
        .await
        .unwrap();
    assert!(admin.is_administrator());
    assert!(!ada.is_administrator());

    let token = ada
        .make_confirm_token(&codec, Duration::seconds(3600))
        .unwrap();

    // A later request loads the account afresh
    let mut request = db.session();
    let mut loaded = request.load_user(ada.id).await.unwrap().unwrap();
    assert!(!loaded.confirmed);
    assert!(loaded.check_password("engine"));
    assert!(loaded.check_token(&codec, &token, &mut request));
    loaded.update_last_seen(&mut request);
    request.commit().await.unwrap();

    let mut request = db.session();
    let author = request.load_user(ada.id).await.unwrap().unwrap();
    assert!(author.confirmed);
    let identity = Identity::from(author.clone());
    assert!(identity.check_permit(Permit::WriteArticle));

    request.add(NewPost::new(&author, "Notes", "On the analytical engine."));
    request.commit().await.unwrap();

    let posts: Vec<Post> = db.session().posts_by_author(ada.id).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].title, "Notes");
}

#[tokio::test]
async fn test_seeding_a_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let db = open(&dir).await;
    let mut session = db.session();

    let users = User::fake_data(&mut session, Some(ADMIN), 5).await.unwrap();
    let posts = Post::fake_data(&mut session, 10).await.unwrap();

    assert_eq!(users.total(), 5);
    assert_eq!(posts.created, 10);
    assert_eq!(session.user_count().await.unwrap(), users.created as i64);
}
