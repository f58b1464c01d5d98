use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use papergraph_common::{AppConfig, FeedOrder, Page, UserId};
use papergraph_domains::Services;
use papergraph_store::PgStore;

#[derive(Parser)]
#[command(name = "papergraph", about = "Operator tooling for the papergraph social core")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Insert any missing badge catalog templates
    SeedBadges,
    /// Evaluate and award badges for one user
    Evaluate {
        #[arg(long)]
        user: UserId,
    },
    /// Re-run badge evaluation for every user with stats
    Reconcile,
    /// Print a user's stats and badges
    Stats {
        #[arg(long)]
        user: UserId,
    },
    /// Print a user's personalized activity and analysis feeds
    Feed {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Print the public analysis feed
    PublicFeed {
        /// like, suggest or recent
        #[arg(long, default_value = "recent")]
        order: String,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Print the highest-scored public paper evaluations
    TopEvaluations {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Print score aggregates for one paper's public evaluations
    EvaluationStats {
        #[arg(long)]
        paper: i64,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn page(config: &AppConfig, limit: Option<i64>, offset: i64) -> Page {
    let limit = limit
        .unwrap_or(config.feed_page_size)
        .min(config.feed_max_page_size);
    Page::new(limit, offset)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let store = PgStore::connect(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    tracing::info!(
        max_connections = config.database_max_connections,
        "Connected to database"
    );

    if let Command::Migrate = cli.command {
        store.migrate().await?;
        tracing::info!("Migrations complete");
        return Ok(());
    }

    let services = Services::new(Arc::new(store));
    if config.seed_badge_catalog {
        services.badges.seed_catalog().await?;
    }

    match cli.command {
        Command::Migrate => {}
        Command::SeedBadges => {
            let inserted = services.badges.seed_catalog().await?;
            print_json(&serde_json::json!({ "inserted": inserted }))?;
        }
        Command::Evaluate { user } => {
            let awarded = services.badges.evaluate_and_award(user).await?;
            print_json(&awarded)?;
        }
        Command::Reconcile => {
            let report = services.badges.reconcile_all().await?;
            print_json(&report)?;
        }
        Command::Stats { user } => {
            let stats = services.badges.get_user_stats(user).await?;
            let badges = services.badges.get_user_badges(user).await?;
            print_json(&serde_json::json!({ "stats": stats, "badges": badges }))?;
        }
        Command::Feed {
            user,
            limit,
            offset,
        } => {
            let page = page(&config, limit, offset);
            let activities = services.feed.get_user_activity_feed(user, page).await?;
            let analyses = services.feed.get_user_analysis_feed(user, page).await?;
            print_json(&serde_json::json!({
                "activities": activities,
                "analyses": analyses,
            }))?;
        }
        Command::PublicFeed {
            order,
            limit,
            offset,
        } => {
            let page = page(&config, limit, offset);
            tracing::info!(order = %FeedOrder::parse(&order), "Loading public feed");
            let feed = services.feed.get_public_feed(&order, page).await?;
            print_json(&feed)?;
        }
        Command::TopEvaluations { limit } => {
            let top = services.evaluations.top(limit).await?;
            print_json(&top)?;
        }
        Command::EvaluationStats { paper } => {
            let stats = services.evaluations.statistics(paper).await?;
            print_json(&stats)?;
        }
    }

    Ok(())
}
