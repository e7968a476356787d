//! Quill CLI - management commands for the Quill blog backend
//!
//! Creates the schema, reconciles the role catalog, seeds demo data and
//! handles email-confirmation tokens from the command line.

use anyhow::{bail, Context};
use chrono::Duration;
use clap::{Parser, Subcommand};
use quill_core::{init_logging, LogFormat, QuillConfig, MAX_TOKEN_TTL_SECS};
use quill_models::{Database, Post, Role, SeedReport, TokenCodec, User};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(about = "Management commands for the Quill blog backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the database URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Create the schema and reconcile the role catalog
    Deploy,

    /// Seed demo users and posts
    Fake {
        /// Number of users to create
        #[arg(long, default_value = "100")]
        users: usize,

        /// Number of posts to create
        #[arg(long, default_value = "200")]
        posts: usize,
    },

    /// Print a confirmation token for an account
    ConfirmToken {
        /// Account email
        email: String,

        /// Token lifetime in seconds, defaults to the configured TTL
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..=MAX_TOKEN_TTL_SECS as i64))]
        ttl: Option<i64>,
    },

    /// Confirm an account with a token
    Confirm {
        /// Account email
        email: String,

        /// Token from `confirm-token`
        token: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = QuillConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(url) = &cli.database_url {
        config.database_url = url.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    } else if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if cli.verbose {
        config.logging.format = LogFormat::Pretty;
    }

    init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting Quill CLI v{}", env!("CARGO_PKG_VERSION"));

    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;
    let codec = TokenCodec::from_config(&config);

    match cli.command {
        Commands::Deploy => {
            handle_deploy(&db).await?;
            println!("Deployed roles to {}", config.database_url);
        }
        Commands::Fake { users, posts } => {
            let (users, posts) =
                handle_fake(&db, config.admin_email.as_deref(), users, posts).await?;
            println!("Users: {} created, {} skipped", users.created, users.skipped);
            println!("Posts: {} created, {} skipped", posts.created, posts.skipped);
        }
        Commands::ConfirmToken { email, ttl } => {
            let ttl = ttl.map(Duration::seconds).unwrap_or_else(|| config.token_ttl());
            let token = handle_confirm_token(&db, &codec, &email, ttl).await?;
            println!("{}", token);
        }
        Commands::Confirm { email, token } => {
            handle_confirm(&db, &codec, &email, &token).await?;
            println!("Confirmed {}", email);
        }
    }

    Ok(())
}

async fn handle_deploy(db: &Database) -> anyhow::Result<()> {
    Role::update_permit(&mut db.session()).await?;
    Ok(())
}

async fn handle_fake(
    db: &Database,
    admin_email: Option<&str>,
    users: usize,
    posts: usize,
) -> anyhow::Result<(SeedReport, SeedReport)> {
    let mut session = db.session();
    let users = User::fake_data(&mut session, admin_email, users).await?;
    let posts = Post::fake_data(&mut session, posts).await?;
    Ok((users, posts))
}

async fn find_user(db: &Database, email: &str) -> anyhow::Result<User> {
    match db.session().user_by_email(email).await? {
        Some(user) => Ok(user),
        None => bail!("No account with email {}", email),
    }
}

async fn handle_confirm_token(
    db: &Database,
    codec: &TokenCodec,
    email: &str,
    ttl: Duration,
) -> anyhow::Result<String> {
    let user = find_user(db, email).await?;
    Ok(user.make_confirm_token(codec, ttl)?)
}

async fn handle_confirm(
    db: &Database,
    codec: &TokenCodec,
    email: &str,
    token: &str,
) -> anyhow::Result<()> {
    let mut user = find_user(db, email).await?;
    let mut session = db.session();

    if !user.check_token(codec, token, &mut session) {
        bail!("Token is invalid, expired or belongs to another account");
    }
    session.commit().await?;
    Ok(())
}
