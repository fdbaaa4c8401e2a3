use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use podshelf::config;
use podshelf::db;
use podshelf::model::PodcastItem;
use podshelf::paging::LoadState;
use podshelf::{CachePolicy, CatalogClient, CatalogRepository, LocalStore, PodcastViewModel};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load the catalog from the first page and print it
    Browse {
        /// Number of pages to load
        #[arg(long, default_value = "1")]
        pages: u32,
    },
    /// Pull-to-refresh the first page and print the result
    Refresh,
    /// Mark a podcast as favorite (or unmark it with --unset)
    Favorite {
        id: String,
        #[arg(long)]
        unset: bool,
    },
    /// Print favorite podcast ids
    Favorites,
    /// Print the cached catalog snapshot
    Cache,
    /// Print an example config file
    ExampleConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    if let Command::ExampleConfig = args.command {
        print!("{}", config::example());
        return Ok(());
    }

    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.database_url());
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;
    let store = LocalStore::open(pool).await?;

    match args.command {
        Command::Browse { pages } => {
            let mut vm = view_model(&cfg, store)?;
            vm.process_pending_intents().await;
            for _ in 1..pages.max(1) {
                if !vm.load_more().await {
                    break;
                }
            }
            report(&vm);
        }
        Command::Refresh => {
            let mut vm = view_model(&cfg, store)?;
            let mut refreshing = vm.is_refreshing();
            vm.process_pending_intents().await;
            vm.on_pull_to_refresh();
            vm.process_pending_intents().await;
            info!(is_refreshing = *refreshing.borrow_and_update(), "refresh finished");
            report(&vm);
        }
        Command::Favorite { id, unset } => {
            if unset {
                store.remove_favorite(&id).await?;
            } else {
                store.add_favorite(&id).await?;
            }
            info!(%id, favorite = !unset, "favorite updated");
        }
        Command::Favorites => {
            for id in store.subscribe_favorites().borrow().iter() {
                println!("{}", id);
            }
        }
        Command::Cache => {
            let favorites = store.subscribe_favorites().borrow().clone();
            for entry in store.read_all_catalog_entries().await? {
                print_item(&PodcastItem::annotate(entry, &favorites));
            }
        }
        Command::ExampleConfig => {}
    }

    Ok(())
}

fn view_model(cfg: &config::Config, store: LocalStore) -> Result<PodcastViewModel> {
    let client = CatalogClient::from_config(cfg)?;
    let repository = CatalogRepository::with_policy(client, store, CachePolicy::from(&cfg.cache));
    Ok(PodcastViewModel::new(Arc::new(repository)))
}

fn report(vm: &PodcastViewModel) {
    if let Some(err) = vm.notification() {
        warn!(code = err.code, message = %err.message, "could not load podcasts");
    }
    let items = vm.items();
    for item in &items {
        print_item(item);
    }
    if items.is_empty() && !matches!(vm.pager().refresh_state(), LoadState::Error(_)) {
        println!("No podcasts available.");
    }
}

fn print_item(item: &PodcastItem) {
    let marker = if item.is_favorite { "*" } else { " " };
    println!(
        "{} {:<24} {} ({})",
        marker, item.entry.id, item.entry.title, item.entry.publisher
    );
}
