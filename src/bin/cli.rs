//! CLI for browsing and voting on forum posts

use anyhow::Context;
use clap::{Parser, Subcommand};
use fitforum::common::{parse_duration, validate_post_id, Config};
use fitforum::session::{Member, Role};
use fitforum::{
    HttpForumApi, PostFeed, QueryCache, Session, VoteCoordinator, VoteDirection, VoteOutcome,
    VoterId,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fitforum")]
#[command(about = "Fitness platform forum client")]
#[command(version)]
struct Cli {
    /// Backend base URL (overrides config)
    #[arg(long)]
    api: Option<String>,

    /// Request timeout, e.g. 500ms, 10s (overrides config)
    #[arg(long)]
    timeout: Option<String>,

    /// Bearer token (overrides config)
    #[arg(long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List forum posts with their vote counts
    Posts {
        /// Mark this member's votes
        #[arg(long)]
        voter: Option<String>,
    },

    /// Upvote or downvote a post
    Vote {
        /// Post id
        post_id: String,

        /// up or down
        direction: VoteDirection,

        /// Member email to vote as
        #[arg(long)]
        voter: Option<String>,
    },
}

fn print_posts(posts: &[fitforum::Post], voter: Option<&VoterId>) {
    println!(
        "{:<26} {:>5} {:>5} {:>6}  {:<4}  title",
        "id", "up", "down", "score", "you"
    );
    for post in posts {
        let mine = voter
            .and_then(|v| post.votes.choice_of(v))
            .map_or("-", |d| d.as_str());
        println!(
            "{:<26} {:>5} {:>5} {:>6}  {:<4}  {}",
            post.id,
            post.votes.upvotes,
            post.votes.downvotes,
            post.votes.score(),
            mine,
            post.title
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().context("loading configuration")?;
    if let Some(api) = cli.api {
        config.api.base_url = api;
    }
    if let Some(timeout) = cli.timeout.as_deref() {
        config.api.set_timeout(parse_duration(timeout)?)?;
    }
    if let Some(token) = cli.token {
        config.api.auth_token = Some(token);
    }
    config.validate()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let api = Arc::new(HttpForumApi::new(&config.api)?);
    let cache = Arc::new(QueryCache::with_stale_after(config.cache.stale_after()));
    let feed = PostFeed::new(cache.clone(), api.clone());

    match cli.command {
        Commands::Posts { voter } => {
            let posts = feed.refresh().await?;
            let voter = voter.map(VoterId::new);
            print_posts(&posts, voter.as_ref());
        }

        Commands::Vote {
            post_id,
            direction,
            voter,
        } => {
            validate_post_id(&post_id)?;

            let session = Session::new();
            if let Some(email) = voter {
                session.sign_in(Member {
                    email,
                    name: None,
                    role: Role::Member,
                });
            }
            let voter = session
                .require_voter()
                .context("pass --voter <email> to vote")?;

            // Seed the cache so the vote has something to write into
            feed.refresh().await?;

            let coordinator = VoteCoordinator::from_config(cache, api, &config.votes);
            match coordinator.apply_vote(&voter, &post_id, direction).await {
                VoteOutcome::Committed { ack } => {
                    println!(
                        "{}",
                        ack.message.unwrap_or_else(|| format!("{}vote recorded", direction))
                    );
                    let posts = feed.refresh().await?;
                    print_posts(&posts, Some(&voter));
                }
                VoteOutcome::RolledBack { error } | VoteOutcome::Superseded { error } => {
                    anyhow::bail!("vote failed: {}", error);
                }
            }
        }
    }

    Ok(())
}
