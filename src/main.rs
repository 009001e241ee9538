mod config;
mod directory;
mod error;
mod offline;
mod store;
mod sync;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use config::Config;
use directory::{Directory, DirectoryClient, Restaurant, Review, ALL};
use offline::{CachedResponse, HttpAssetSource, OfflineWorker, SqliteAssetCache};
use store::{KeyValueStore, SqliteStore};
use sync::{Record, SyncHelper};

#[derive(Parser, Debug)]
#[command(name = "restodir")]
#[command(about = "Browse a restaurant directory with a local store and offline asset cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/restodir/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Base URL of the restaurants API
  #[arg(long)]
  base_url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  #[command(flatten)]
  Directory(DirectoryCommand),
  /// Manage the offline asset cache
  Assets {
    #[command(subcommand)]
    command: AssetsCommand,
  },
}

#[derive(Subcommand, Debug)]
enum DirectoryCommand {
  /// List restaurants, optionally filtered
  Restaurants {
    #[arg(long, default_value = ALL)]
    cuisine: String,
    #[arg(long, default_value = ALL)]
    neighborhood: String,
  },
  /// Show one restaurant
  Restaurant { id: String },
  /// List distinct cuisines
  Cuisines,
  /// List distinct neighborhoods
  Neighborhoods,
  /// List reviews for a restaurant
  Reviews { restaurant_id: String },
  /// Empty a local store
  Clear {
    #[arg(value_enum, default_value_t = StoreArg::All)]
    store: StoreArg,
  },
}

#[derive(Subcommand, Debug)]
enum AssetsCommand {
  /// Fetch the static asset list into the current bucket
  Install {
    /// Store nothing unless every asset fetches
    #[arg(long)]
    strict: bool,
  },
  /// Delete every bucket except the current one
  Activate,
  /// Fetch a URL network-first, falling back to the cache
  Fetch { url: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StoreArg {
  Restaurants,
  Reviews,
  All,
}

/// Detail view: a restaurant and its reviews
#[derive(Serialize)]
struct RestaurantDetail {
  #[serde(flatten)]
  restaurant: Restaurant,
  #[serde(skip_serializing_if = "Option::is_none")]
  page_url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  image_url: Option<String>,
  reviews: Vec<Review>,
}

#[derive(Serialize)]
struct FetchReport<'a> {
  source: &'static str,
  #[serde(flatten)]
  response: &'a CachedResponse,
  bytes: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;
  if let Some(base_url) = args.base_url {
    config.api.base_url = base_url;
  }

  let data_dir = config.data_dir()?;
  let _guard = init_logging(&data_dir)?;

  match args.command {
    Command::Assets { command } => run_assets(&config, &data_dir, command).await,
    Command::Directory(command) => run_directory(&config, &data_dir, command).await,
  }
}

/// Log to a daily file in the data directory; stdout carries command output.
fn init_logging(data_dir: &Path) -> Result<WorkerGuard> {
  let log_dir = data_dir.join("logs");
  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(&log_dir, "restodir.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_env("RESTODIR_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

async fn run_directory(config: &Config, data_dir: &Path, command: DirectoryCommand) -> Result<()> {
  let store = SqliteStore::open_at(data_dir)?;
  let sync = SyncHelper::new(store, &config.database.name, config.database.version);
  let client = DirectoryClient::new(&config.api.base_url)?;
  debug!(api = %client.base_url(), "Using directory API");
  let directory = Directory::new(client, sync);

  match command {
    DirectoryCommand::Restaurants {
      cuisine,
      neighborhood,
    } => print_json(
      &directory
        .restaurants_by_cuisine_and_neighborhood(&cuisine, &neighborhood)
        .await?,
    ),
    DirectoryCommand::Restaurant { id } => {
      let restaurant = directory.restaurant_by_id(&id).await?;
      let reviews = directory.reviews_for_restaurant(&id).await?;
      print_json(&RestaurantDetail {
        page_url: restaurant.page_url(),
        image_url: restaurant.image_url(),
        restaurant,
        reviews,
      })
    }
    DirectoryCommand::Cuisines => print_json(&directory.cuisines().await?),
    DirectoryCommand::Neighborhoods => print_json(&directory.neighborhoods().await?),
    DirectoryCommand::Reviews { restaurant_id } => {
      print_json(&directory.reviews_for_restaurant(&restaurant_id).await?)
    }
    DirectoryCommand::Clear { store } => {
      let names = match store {
        StoreArg::Restaurants => vec![Restaurant::store_name()],
        StoreArg::Reviews => vec![Review::store_name()],
        StoreArg::All => vec![Restaurant::store_name(), Review::store_name()],
      };
      for name in &names {
        let db = directory.sync().open(name)?;
        directory.sync().store().clear(&db, name)?;
      }
      print_json(&names)
    }
  }
}

async fn run_assets(config: &Config, data_dir: &Path, command: AssetsCommand) -> Result<()> {
  let cache = SqliteAssetCache::open(data_dir.join("asset-cache.db"))?;
  let source = HttpAssetSource::new(Duration::from_secs(30))?;
  let worker = OfflineWorker::new(cache, source, &config.offline)?;

  match command {
    AssetsCommand::Install { strict } => {
      let manifest = if strict {
        worker.install_strict().await?
      } else {
        worker.install().await?
      };
      if !manifest.is_complete() {
        warn!(failed = manifest.failed.len(), "Some assets were not cached");
      }
      print_json(&manifest)
    }
    AssetsCommand::Activate => print_json(&worker.activate()?),
    AssetsCommand::Fetch { url } => {
      let served = worker.intercept(&url).await?;
      let source = if served.is_from_cache() { "cache" } else { "network" };
      print_json(&FetchReport {
        source,
        response: served.response(),
        bytes: served.response().body.len(),
      })
    }
  }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  let out =
    serde_json::to_string_pretty(value).map_err(|e| eyre!("Failed to encode output: {}", e))?;
  println!("{}", out);
  Ok(())
}
