//! SQLite persistence: schema, sessions and queries

use crate::{
    permit::Permit,
    post::{NewPost, Post},
    role::Role,
    user::{NewUser, User},
};
use quill_core::{ErrorContext, QuillError, QuillResult};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Row, SqliteConnection, SqlitePool,
};
use chrono::{DateTime, Utc};
use std::{mem, str::FromStr};
use tracing::{debug, info, warn};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS roles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT UNIQUE NOT NULL,
        permit INTEGER NOT NULL DEFAULT 0,
        is_default BOOLEAN NOT NULL DEFAULT FALSE
    );

    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT UNIQUE NOT NULL,
        username TEXT UNIQUE NOT NULL,
        name TEXT,
        password_hash TEXT,
        confirmed BOOLEAN NOT NULL DEFAULT FALSE,
        location TEXT,
        about_me TEXT,
        member_since TEXT NOT NULL,
        last_seen TEXT NOT NULL,
        avatar_hash TEXT,
        role_id INTEGER REFERENCES roles(id)
    );

    CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
    CREATE INDEX IF NOT EXISTS idx_users_username ON users(username);

    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        author_id INTEGER NOT NULL REFERENCES users(id)
    );

    CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id);
"#;

const USER_COLUMNS: &str = r#"
    u.id, u.email, u.username, u.name, u.password_hash, u.confirmed, u.location,
    u.about_me, u.member_since, u.last_seen, u.avatar_hash, u.role_id,
    r.name AS role_name, r.permit AS role_permit, r.is_default AS role_is_default
"#;

fn storage(operation: &'static str) -> impl FnOnce(sqlx::Error) -> QuillError {
    move |e| {
        warn!(operation, error = %e, "Database operation failed");
        QuillError::Storage {
            message: format!("{} failed: {}", operation, e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("store").with_operation(operation),
        }
    }
}

/// Connection pool for the blog database
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a pool for `url`, creating the database file if missing.
    ///
    /// In-memory databases are private to a connection, so those pools hold
    /// exactly one connection that is never recycled.
    pub async fn connect(url: &str) -> QuillResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(storage("parse_database_url"))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(storage("connect"))?;

        info!("Connected to database: {}", url);
        Ok(Self { pool })
    }

    /// Fresh in-memory database with the schema applied
    pub async fn in_memory() -> QuillResult<Self> {
        let db = Self::connect("sqlite::memory:").await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Create the roles, users and posts tables if absent
    pub async fn migrate(&self) -> QuillResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(storage("migrate"))?;

        debug!("Database schema is up to date");
        Ok(())
    }

    /// Open a unit of work against this database
    pub fn session(&self) -> Session {
        Session {
            pool: self.pool.clone(),
            pending: Vec::new(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// A write waiting in a [`Session`]
#[derive(Debug, Clone)]
pub enum Change {
    /// Insert or update a role, matched by name
    UpsertRole(Role),
    InsertUser(NewUser),
    /// Overwrite only the listed columns of an existing user
    UpdateUser { id: i64, fields: Vec<UserField> },
    InsertPost(NewPost),
}

/// One column of a stored user
#[derive(Debug, Clone, PartialEq)]
pub enum UserField {
    Email(String),
    Name(Option<String>),
    PasswordHash(String),
    Confirmed(bool),
    Location(Option<String>),
    AboutMe(Option<String>),
    LastSeen(DateTime<Utc>),
    AvatarHash(String),
    RoleId(Option<i64>),
}

impl Change {
    /// Stage a single column update of user `id`
    pub fn update_user(id: i64, field: UserField) -> Self {
        Change::UpdateUser {
            id,
            fields: vec![field],
        }
    }
}

impl From<Role> for Change {
    fn from(role: Role) -> Self {
        Change::UpsertRole(role)
    }
}

impl From<NewUser> for Change {
    fn from(user: NewUser) -> Self {
        Change::InsertUser(user)
    }
}

impl From<NewPost> for Change {
    fn from(post: NewPost) -> Self {
        Change::InsertPost(post)
    }
}

/// Unit of work: staged changes plus the read queries the models need.
///
/// Writes are only staged by [`Session::add`] and reach the database on
/// [`Session::commit`]. A failed commit keeps its changes, so every later
/// commit fails the same way until [`Session::rollback`] discards them.
#[derive(Debug)]
pub struct Session {
    pool: SqlitePool,
    pending: Vec<Change>,
}

impl Session {
    /// Stage a change. Updates of a user already staged are merged into
    /// the earlier update, later values winning per column.
    pub fn add(&mut self, change: impl Into<Change>) {
        let change = change.into();
        if let Change::UpdateUser { id, fields } = &change {
            let staged = self.pending.iter_mut().find_map(|staged| match staged {
                Change::UpdateUser {
                    id: staged_id,
                    fields: staged_fields,
                } if *staged_id == *id => Some(staged_fields),
                _ => None,
            });
            if let Some(staged) = staged {
                for field in fields {
                    merge_field(staged, field.clone());
                }
                return;
            }
        }
        self.pending.push(change);
    }

    /// Changes staged since the last commit or rollback
    pub fn pending(&self) -> &[Change] {
        &self.pending
    }

    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Apply every staged change in a single transaction
    pub async fn commit(&mut self) -> QuillResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(storage("begin"))?;
        for change in &self.pending {
            // Dropping `tx` on error rolls the transaction back.
            apply(&mut tx, change).await.map_err(storage("commit"))?;
        }
        tx.commit().await.map_err(storage("commit"))?;

        debug!("Committed {} staged changes", self.pending.len());
        self.pending.clear();
        Ok(())
    }

    /// Discard staged changes
    pub fn rollback(&mut self) {
        if !self.pending.is_empty() {
            debug!("Rolling back {} staged changes", self.pending.len());
        }
        self.pending.clear();
    }

    pub async fn role_by_name(&self, name: &str) -> QuillResult<Option<Role>> {
        let row = sqlx::query("SELECT id, name, permit, is_default FROM roles WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("role_by_name"))?;

        row.as_ref()
            .map(role_from_row)
            .transpose()
            .map_err(storage("role_by_name"))
    }

    /// The role flagged as default, if the catalog has been applied
    pub async fn default_role(&self) -> QuillResult<Option<Role>> {
        let row = sqlx::query(
            "SELECT id, name, permit, is_default FROM roles WHERE is_default = TRUE ORDER BY id LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(storage("default_role"))?;

        row.as_ref()
            .map(role_from_row)
            .transpose()
            .map_err(storage("default_role"))
    }

    pub async fn roles(&self) -> QuillResult<Vec<Role>> {
        let rows = sqlx::query("SELECT id, name, permit, is_default FROM roles ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(storage("roles"))?;

        rows.iter()
            .map(role_from_row)
            .collect::<Result<_, _>>()
            .map_err(storage("roles"))
    }

    /// Load a user and its role by id
    pub async fn load_user(&self, user_id: i64) -> QuillResult<Option<User>> {
        self.fetch_user("u.id = ?", SqlValue::Int(user_id), "load_user")
            .await
    }

    pub async fn user_by_email(&self, email: &str) -> QuillResult<Option<User>> {
        self.fetch_user("u.email = ?", SqlValue::Text(email), "user_by_email")
            .await
    }

    pub async fn user_by_username(&self, username: &str) -> QuillResult<Option<User>> {
        self.fetch_user("u.username = ?", SqlValue::Text(username), "user_by_username")
            .await
    }

    pub async fn user_count(&self) -> QuillResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(storage("user_count"))?;

        Ok(row.get("count"))
    }

    /// Id of a uniformly chosen existing user
    pub async fn random_user_id(&self) -> QuillResult<Option<i64>> {
        let row = sqlx::query("SELECT id FROM users ORDER BY RANDOM() LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("random_user_id"))?;

        Ok(row.map(|row| row.get("id")))
    }

    /// Posts written by `author_id`, newest first
    pub async fn posts_by_author(&self, author_id: i64) -> QuillResult<Vec<Post>> {
        let rows = sqlx::query(
            "SELECT id, title, content, timestamp, author_id FROM posts \
             WHERE author_id = ? ORDER BY timestamp DESC, id DESC",
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage("posts_by_author"))?;

        rows.iter()
            .map(|row| {
                Ok(Post {
                    id: row.try_get("id")?,
                    title: row.try_get("title")?,
                    content: row.try_get("content")?,
                    timestamp: row.try_get("timestamp")?,
                    author_id: row.try_get("author_id")?,
                })
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(storage("posts_by_author"))
    }

    async fn fetch_user(
        &self,
        predicate: &str,
        value: SqlValue<'_>,
        operation: &'static str,
    ) -> QuillResult<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users u LEFT JOIN roles r ON r.id = u.role_id WHERE {}",
            USER_COLUMNS, predicate
        );
        let query = sqlx::query(&sql);
        let query = match value {
            SqlValue::Int(v) => query.bind(v),
            SqlValue::Text(v) => query.bind(v),
        };

        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(storage(operation))?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(storage(operation))
    }
}

enum SqlValue<'a> {
    Int(i64),
    Text(&'a str),
}

async fn apply(conn: &mut SqliteConnection, change: &Change) -> Result<(), sqlx::Error> {
    match change {
        Change::UpsertRole(role) => {
            sqlx::query(
                "INSERT INTO roles (name, permit, is_default) VALUES (?, ?, ?) \
                 ON CONFLICT(name) DO UPDATE SET permit = excluded.permit, is_default = excluded.is_default",
            )
            .bind(&role.name)
            .bind(role.permit.to_stored())
            .bind(role.default)
            .execute(&mut *conn)
            .await?;
        }
        Change::InsertUser(user) => {
            sqlx::query(
                "INSERT INTO users (email, username, name, password_hash, confirmed, location, \
                 about_me, member_since, last_seen, role_id) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.name)
            .bind(&user.password_hash)
            .bind(user.confirmed)
            .bind(&user.location)
            .bind(&user.about_me)
            .bind(user.member_since)
            .bind(user.member_since)
            .bind(user.role_id)
            .execute(&mut *conn)
            .await?;
        }
        Change::UpdateUser { id, fields } => {
            for field in fields {
                update_user_field(&mut *conn, *id, field).await?;
            }
        }
        Change::InsertPost(post) => {
            sqlx::query(
                "INSERT INTO posts (title, content, timestamp, author_id) VALUES (?, ?, ?, ?)",
            )
            .bind(&post.title)
            .bind(&post.content)
            .bind(post.timestamp)
            .bind(post.author_id)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}

fn merge_field(staged: &mut Vec<UserField>, field: UserField) {
    match staged
        .iter_mut()
        .find(|existing| mem::discriminant(*existing) == mem::discriminant(&field))
    {
        Some(existing) => *existing = field,
        None => staged.push(field),
    }
}

async fn update_user_field(
    conn: &mut SqliteConnection,
    id: i64,
    field: &UserField,
) -> Result<(), sqlx::Error> {
    let query = match field {
        UserField::Email(email) => {
            sqlx::query("UPDATE users SET email = ? WHERE id = ?").bind(email)
        }
        UserField::Name(name) => {
            sqlx::query("UPDATE users SET name = ? WHERE id = ?").bind(name)
        }
        UserField::PasswordHash(hash) => {
            sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?").bind(hash)
        }
        UserField::Confirmed(confirmed) => {
            sqlx::query("UPDATE users SET confirmed = ? WHERE id = ?").bind(*confirmed)
        }
        UserField::Location(location) => {
            sqlx::query("UPDATE users SET location = ? WHERE id = ?").bind(location)
        }
        UserField::AboutMe(about_me) => {
            sqlx::query("UPDATE users SET about_me = ? WHERE id = ?").bind(about_me)
        }
        UserField::LastSeen(last_seen) => {
            sqlx::query("UPDATE users SET last_seen = ? WHERE id = ?").bind(*last_seen)
        }
        UserField::AvatarHash(hash) => {
            sqlx::query("UPDATE users SET avatar_hash = ? WHERE id = ?").bind(hash)
        }
        UserField::RoleId(role_id) => {
            sqlx::query("UPDATE users SET role_id = ? WHERE id = ?").bind(*role_id)
        }
    };

    query.bind(id).execute(&mut *conn).await?;
    Ok(())
}

fn role_from_row(row: &SqliteRow) -> Result<Role, sqlx::Error> {
    Ok(Role {
        id: Some(row.try_get("id")?),
        name: row.try_get("name")?,
        permit: Permit::from_stored(row.try_get("permit")?),
        default: row.try_get("is_default")?,
    })
}

fn user_from_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
    let role_id: Option<i64> = row.try_get("role_id")?;
    let role_name: Option<String> = row.try_get("role_name")?;

    let role = match (role_id, role_name) {
        (Some(id), Some(name)) => Some(Role {
            id: Some(id),
            name,
            permit: Permit::from_stored(row.try_get("role_permit")?),
            default: row.try_get("role_is_default")?,
        }),
        _ => None,
    };

    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        username: row.try_get("username")?,
        name: row.try_get("name")?,
        password_hash: row.try_get("password_hash")?,
        confirmed: row.try_get("confirmed")?,
        location: row.try_get("location")?,
        about_me: row.try_get("about_me")?,
        member_since: row.try_get("member_since")?,
        last_seen: row.try_get("last_seen")?,
        avatar_hash: row.try_get("avatar_hash")?,
        role,
    })
}
