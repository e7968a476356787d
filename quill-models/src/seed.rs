//! Demo data for development databases

use crate::{
    post::{NewPost, Post},
    store::Session,
    user::{hash_password, NewUser, User},
};
use chrono::{DateTime, Duration, Utc};
use quill_core::QuillResult;
use rand::{seq::SliceRandom, Rng};
use serde::Serialize;
use tracing::{debug, info};

/// Password of every seeded account
pub const FAKE_PASSWORD: &str = "123456";

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Barbara", "Dennis", "Edsger", "Frances", "Grace", "Niklaus", "Radia", "Ken",
    "Margaret", "Donald", "John", "Leslie", "Tony", "Hedy",
];

const LAST_NAMES: &[&str] = &[
    "Lovelace", "Turing", "Liskov", "Ritchie", "Dijkstra", "Allen", "Hopper", "Wirth", "Perlman",
    "Thompson", "Hamilton", "Knuth", "McCarthy", "Lamport", "Hoare", "Lamarr",
];

const CITIES: &[&str] = &[
    "London", "Paris", "Berlin", "Lisbon", "Oslo", "Kyoto", "Toronto", "Austin", "Nairobi",
    "Santiago", "Melbourne", "Reykjavik",
];

const DOMAINS: &[&str] = &["example.com", "example.org", "example.net", "mail.test"];

const LOREM: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua", "enim",
    "minim", "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi",
    "aliquip", "commodo", "consequat",
];

/// Outcome of a bulk seed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub created: usize,
    /// Items whose commit failed and was rolled back
    pub skipped: usize,
}

impl SeedReport {
    pub fn total(&self) -> usize {
        self.created + self.skipped
    }
}

impl User {
    /// Create `count` confirmed accounts with random profiles and the
    /// password [`FAKE_PASSWORD`]. Duplicates are skipped.
    pub async fn fake_data(
        session: &mut Session,
        admin_email: Option<&str>,
        count: usize,
    ) -> QuillResult<SeedReport> {
        let hash = hash_password(FAKE_PASSWORD)?;
        let users = (0..count).map(|_| fake_user().with_password_hash(hash.clone()));

        let report = seed_users(session, admin_email, users).await?;
        info!(
            "Seeded users: {} created, {} skipped",
            report.created, report.skipped
        );
        Ok(report)
    }
}

impl Post {
    /// Create `count` posts by randomly chosen existing users.
    ///
    /// Without any users nothing is created and every post is skipped.
    pub async fn fake_data(session: &mut Session, count: usize) -> QuillResult<SeedReport> {
        let mut report = SeedReport::default();

        for _ in 0..count {
            let Some(author_id) = session.random_user_id().await? else {
                report.skipped += 1;
                continue;
            };

            session.add(fake_post(author_id));
            commit_or_skip(session, &mut report).await;
        }

        info!(
            "Seeded posts: {} created, {} skipped",
            report.created, report.skipped
        );
        Ok(report)
    }
}

async fn seed_users(
    session: &mut Session,
    admin_email: Option<&str>,
    users: impl Iterator<Item = NewUser>,
) -> QuillResult<SeedReport> {
    let mut report = SeedReport::default();

    for mut user in users {
        user.assign_role(session, admin_email).await?;
        session.add(user);
        commit_or_skip(session, &mut report).await;
    }

    Ok(report)
}

async fn commit_or_skip(session: &mut Session, report: &mut SeedReport) {
    match session.commit().await {
        Ok(()) => report.created += 1,
        Err(e) => {
            debug!("Skipping seed item: {}", e);
            session.rollback();
            report.skipped += 1;
        }
    }
}

fn pick<R: Rng>(rng: &mut R, words: &[&'static str]) -> &'static str {
    words.choose(rng).copied().unwrap_or_default()
}

fn words<R: Rng>(rng: &mut R, count: usize) -> String {
    (0..count)
        .map(|_| pick(rng, LOREM))
        .collect::<Vec<_>>()
        .join(" ")
}

fn sentence<R: Rng>(rng: &mut R) -> String {
    let len = rng.gen_range(4..=12);
    let mut sentence = words(rng, len);
    if let Some(first) = sentence.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    sentence.push('.');
    sentence
}

fn sentences<R: Rng>(rng: &mut R, count: usize) -> String {
    (0..count)
        .map(|_| sentence(rng))
        .collect::<Vec<_>>()
        .join(" ")
}

/// A random moment within the past three years
fn past_date<R: Rng>(rng: &mut R) -> DateTime<Utc> {
    Utc::now() - Duration::seconds(rng.gen_range(0..3 * 365 * 24 * 3600))
}

fn fake_user() -> NewUser {
    let mut rng = rand::thread_rng();
    let first = pick(&mut rng, FIRST_NAMES);
    let last = pick(&mut rng, LAST_NAMES);
    let username = format!(
        "{}{}{}",
        first.to_lowercase(),
        last.to_lowercase(),
        rng.gen_range(0..100)
    );
    let email = format!("{}@{}", username, pick(&mut rng, DOMAINS));
    let sentence_count = rng.gen_range(1..=3);
    let about_me = sentences(&mut rng, sentence_count);

    NewUser::new(email, username)
        .with_name(format!("{} {}", first, last))
        .confirmed(true)
        .with_location(pick(&mut rng, CITIES))
        .with_about_me(about_me)
        .member_since(past_date(&mut rng))
}

fn fake_post(author_id: i64) -> NewPost {
    let mut rng = rand::thread_rng();
    let sentence_count = rng.gen_range(3..=8);
    let content = sentences(&mut rng, sentence_count);

    NewPost {
        title: pick(&mut rng, LOREM).to_string(),
        content,
        timestamp: past_date(&mut rng),
        author_id,
    }
}
