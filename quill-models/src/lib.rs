//! Quill Models - accounts, roles and posts of the blog
//!
//! This crate holds the domain model and its persistence:
//!
//! - Permission bits and the static role catalog
//! - User accounts with write-only passwords, confirmation tokens and avatars
//! - Posts owned by users
//! - A SQLite unit of work ([`Session`]) that stages changes until commit
//! - Demo data seeding
//!
//! Request handling lives in `quill-web`, which builds on [`Identity`] and
//! [`TokenCodec`].

pub mod identity;
pub mod permit;
pub mod post;
pub mod role;
pub mod seed;
pub mod store;
pub mod token;
pub mod user;

pub use identity::Identity;
pub use permit::Permit;
pub use post::{NewPost, Post};
pub use role::{catalog, CatalogEntry, Role, ADMINISTRATOR_ROLE, ASSISTANT_ROLE, USER_ROLE};
pub use seed::{SeedReport, FAKE_PASSWORD};
pub use store::{Change, Database, Session, UserField};
pub use token::TokenCodec;
pub use user::{NewUser, User, DEFAULT_AVATAR_KIND, DEFAULT_AVATAR_SIZE};
