use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use concert_sync_lib::{init_logging, AppConfig, ConcertManager, ConfigStore, Scheduler};

#[derive(Parser)]
#[command(name = "concert-sync")]
#[command(about = "Concert calendar sync for the portfolio site", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upcoming concerts, after moving any that have finished
    Upcoming,
    /// Most recent past concerts
    Past {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Drop the cache and fetch from the calendar
    Refresh {
        /// Refresh the past list instead of the upcoming one
        #[arg(long)]
        past: bool,
    },
    /// Move finished concerts to the past list
    Sweep,
    /// Configuration and cache state
    Status,
    /// Concerts archived by earlier sweeps, newest first
    Archive,
    /// Update the stored configuration
    Configure(ConfigureArgs),
    /// Load both lists and keep them fresh until Ctrl-C
    Watch,
}

#[derive(Args)]
struct ConfigureArgs {
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long)]
    calendar_id: Option<String>,
    #[arg(long)]
    tag_filter: Option<String>,
    #[arg(long)]
    max_results: Option<usize>,
    /// Drive folder searched for concert photos
    #[arg(long)]
    drive_folder: Option<String>,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config_store = ConfigStore::load();

    let command = match cli.command {
        Commands::Configure(args) => return configure(&config_store, args),
        command => command,
    };

    let config = config_store.read().with_env();
    let manager = ConcertManager::open_default(&config).context("failed to open concert store")?;

    match command {
        Commands::Upcoming => {
            manager.fetch_past_concerts(manager.past_limit()).await;
            print_json(&manager.fetch_upcoming_concerts().await)
        }
        Commands::Past { limit } => {
            let limit = limit.unwrap_or(manager.past_limit());
            print_json(&manager.fetch_past_concerts(limit).await)
        }
        Commands::Refresh { past: true } => {
            print_json(&manager.force_refresh_past(manager.past_limit()).await)
        }
        Commands::Refresh { past: false } => print_json(&manager.force_refresh().await),
        Commands::Sweep => {
            manager.load().await;
            print_json(&manager.check_and_move_expired_concerts().await)
        }
        Commands::Status => {
            manager.load().await;
            print_json(&manager.status().await)
        }
        Commands::Archive => print_json(&manager.archived_concerts()),
        Commands::Watch => watch(manager, &config).await,
        Commands::Configure(_) => Ok(()),
    }
}

fn configure(store: &ConfigStore, args: ConfigureArgs) -> Result<()> {
    let mut updated = store
        .update(|config| {
            if args.api_key.is_some() {
                config.api_key = args.api_key;
            }
            if args.calendar_id.is_some() {
                config.calendar_id = args.calendar_id;
            }
            if let Some(tag) = args.tag_filter {
                config.concert_tag_filter = tag;
            }
            if let Some(max) = args.max_results {
                config.max_results_display = max;
            }
            if args.drive_folder.is_some() {
                config.drive_parent_folder_id = args.drive_folder;
            }
        })
        .map_err(|err| anyhow!(err))
        .context("failed to save configuration")?;
    if updated.api_key.is_some() {
        updated.api_key = Some("********".to_string());
    }
    print_json(&updated)
}

async fn watch(manager: ConcertManager, config: &AppConfig) -> Result<()> {
    let manager = Arc::new(manager);
    let board = manager.load().await;
    log::info!(
        "loaded {} upcoming and {} past concerts",
        board.upcoming.len(),
        board.past.len()
    );

    let handle = Scheduler::from_config(manager.clone(), config);
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    log::info!("shutting down");
    handle.shutdown().await;
    print_json(&manager.status().await)
}
