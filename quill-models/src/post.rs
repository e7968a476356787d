//! Blog posts

use crate::user::User;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A stored post. Posts are never edited after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub author_id: i64,
}

/// A post waiting to be inserted
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub author_id: i64,
}

impl NewPost {
    /// Post by `author`, stamped with the current time
    pub fn new(author: &User, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            timestamp: Utc::now(),
            author_id: author.id,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{store::Database, user::NewUser};
    use chrono::Duration;

    #[tokio::test]
    async fn test_posts_by_author_newest_first() {
        let db = Database::in_memory().await.unwrap();
        let mut session = db.session();
        let ada = User::register(&mut session, None, NewUser::new("ada@example.com", "ada"))
            .await
            .unwrap();
        let bob = User::register(&mut session, None, NewUser::new("bob@example.com", "bob"))
            .await
            .unwrap();

        let now = Utc::now();
        session.add(NewPost::new(&ada, "old", "first").with_timestamp(now - Duration::days(2)));
        session.add(NewPost::new(&ada, "new", "second").with_timestamp(now));
        session.add(NewPost::new(&bob, "other", "bob's"));
        session.commit().await.unwrap();

        let posts = session.posts_by_author(ada.id).await.unwrap();
        let titles: Vec<_> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "old"]);
        assert!(posts.iter().all(|p| p.author_id == ada.id));
        assert_eq!(posts[0].content, "second");

        assert_eq!(session.posts_by_author(bob.id).await.unwrap().len(), 1);
        assert!(session.posts_by_author(bob.id + 10).await.unwrap().is_empty());
    }
}
