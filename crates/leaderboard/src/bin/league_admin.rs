use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use leaderboard::{Config, LeagueService, LockStrategy};
use serde::Serialize;
use serde::de::DeserializeOwned;
use storage::dto::assignment::{ApplyTagAssignmentsRequest, ResetTagsRequest};
use storage::dto::common::PaginationParams;
use storage::dto::round::ProcessRoundRequest;
use storage::dto::season::{EndSeasonRequest, StartSeasonRequest};
use storage::{AdvisoryGuildLock, Database, GuildLock, RowGuildLock};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "league-admin")]
#[command(about = "Tag league administration", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Process a finished round from a JSON file
    ProcessRound { file: PathBuf },
    /// Apply claims or admin fixes from a JSON file
    Assign { file: PathBuf },
    /// Re-seed every tag in a guild from a finish order
    Reset {
        #[arg(long)]
        guild: String,

        #[arg(long, value_delimiter = ',', required = true)]
        order: Vec<String>,
    },
    Season {
        #[command(subcommand)]
        action: SeasonAction,
    },
    /// List tagged members, best tag first
    Tags {
        #[arg(long)]
        guild: String,
    },
    TagOf {
        #[arg(long)]
        guild: String,

        member: String,
    },
    CheckTag {
        #[arg(long)]
        guild: String,

        tag: i32,
    },
    Standings {
        #[arg(long)]
        guild: String,

        /// Defaults to the active season
        #[arg(long)]
        season: Option<String>,

        #[command(flatten)]
        page: PageArgs,
    },
    History {
        #[arg(long)]
        guild: String,

        #[arg(long)]
        member: Option<String>,

        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Subcommand)]
enum SeasonAction {
    Start {
        #[arg(long)]
        guild: String,

        #[arg(long)]
        id: String,

        #[arg(long)]
        name: String,
    },
    End {
        #[arg(long)]
        guild: String,

        #[arg(long)]
        id: String,
    },
    List {
        #[arg(long)]
        guild: String,
    },
}

#[derive(clap::Args)]
struct PageArgs {
    #[arg(long, default_value_t = 1)]
    page: u32,

    #[arg(long, default_value_t = 50)]
    page_size: u32,
}

impl From<PageArgs> for PaginationParams {
    fn from(args: PageArgs) -> Self {
        Self {
            page: args.page,
            page_size: args.page_size,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "league_admin={},leaderboard={},storage={}",
                    log_level, log_level, log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_lookup(cli.database_url, |key| std::env::var(key).ok())?;

    tracing::info!("Connecting to database...");
    let database = Database::new(&config.database_url, config.max_connections)
        .await
        .context("Failed to connect to database")?;

    if let Commands::Migrate = cli.command {
        database.run_migrations().await?;
        tracing::info!("Migrations applied");
        return Ok(());
    }

    let lock: Arc<dyn GuildLock> = match config.lock_strategy {
        LockStrategy::Advisory => Arc::new(AdvisoryGuildLock),
        LockStrategy::Row => Arc::new(RowGuildLock),
    };

    let service = LeagueService::new(database.pool().clone())
        .with_lock(lock)
        .with_settings(config.engine.clone());

    match cli.command {
        Commands::Migrate => {}
        Commands::ProcessRound { file } => {
            let request: ProcessRoundRequest = read_json(&file).await?;
            print_json(&service.process_round(&request).await?)?;
        }
        Commands::Assign { file } => {
            let request: ApplyTagAssignmentsRequest = read_json(&file).await?;
            print_json(&service.apply_tag_assignments(&request).await?)?;
        }
        Commands::Reset { guild, order } => {
            let request = ResetTagsRequest {
                guild_id: guild,
                finish_order: order,
            };
            print_json(&service.reset_tags(&request).await?)?;
        }
        Commands::Season { action } => match action {
            SeasonAction::Start { guild, id, name } => {
                let request = StartSeasonRequest {
                    guild_id: guild,
                    season_id: id,
                    name,
                };
                print_json(&service.start_season(&request).await?)?;
            }
            SeasonAction::End { guild, id } => {
                let request = EndSeasonRequest {
                    guild_id: guild,
                    season_id: id,
                };
                print_json(&service.end_season(&request).await?)?;
            }
            SeasonAction::List { guild } => {
                print_json(&service.list_seasons(&guild).await?)?;
            }
        },
        Commands::Tags { guild } => {
            print_json(&service.get_tagged_members(&guild).await?)?;
        }
        Commands::TagOf { guild, member } => {
            print_json(&service.get_member_tag(&guild, &member).await?)?;
        }
        Commands::CheckTag { guild, tag } => {
            print_json(&service.check_tag_availability(&guild, tag).await?)?;
        }
        Commands::Standings {
            guild,
            season,
            page,
        } => {
            let pagination = PaginationParams::from(page);
            let standings = service
                .get_season_standings(&guild, season.as_deref(), &pagination)
                .await?;
            print_json(&standings)?;
        }
        Commands::History {
            guild,
            member,
            page,
        } => {
            let pagination = PaginationParams::from(page);
            let history = service
                .get_tag_history(&guild, member.as_deref(), &pagination)
                .await?;
            print_json(&history)?;
        }
    }

    Ok(())
}

async fn read_json<T: DeserializeOwned>(file: &PathBuf) -> Result<T> {
    tracing::info!("Loading request from: {}", file.display());

    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", file.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
