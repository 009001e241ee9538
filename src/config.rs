use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default remote API the directory syncs from.
pub const DEFAULT_API_URL: &str = "http://localhost:1337";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub database: DatabaseConfig,
  #[serde(default)]
  pub offline: OfflineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the restaurants/reviews API
  #[serde(default = "default_api_url")]
  pub base_url: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_api_url(),
    }
  }
}

fn default_api_url() -> String {
  DEFAULT_API_URL.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
  /// Logical database name; also the file stem of the on-disk store
  #[serde(default = "default_db_name")]
  pub name: String,
  /// Bumping this drops every store on next open
  #[serde(default = "default_db_version")]
  pub version: u32,
  /// Explicit directory for database files (defaults to the platform data dir)
  pub path: Option<PathBuf>,
}

impl Default for DatabaseConfig {
  fn default() -> Self {
    Self {
      name: default_db_name(),
      version: default_db_version(),
      path: None,
    }
  }
}

fn default_db_name() -> String {
  "restaurants-data".to_string()
}

fn default_db_version() -> u32 {
  1
}

#[derive(Debug, Clone, Deserialize)]
pub struct OfflineConfig {
  /// Name of the current asset cache bucket
  #[serde(default = "default_cache_name")]
  pub cache_name: String,
  /// Origin that relative asset paths are resolved against
  #[serde(default = "default_origin")]
  pub origin: String,
  /// How long the network gets before falling back to the cache
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
  /// Store successful network responses in the cache while intercepting
  #[serde(default)]
  pub write_through: bool,
  #[serde(default = "default_assets")]
  pub assets: Vec<String>,
}

impl Default for OfflineConfig {
  fn default() -> Self {
    Self {
      cache_name: default_cache_name(),
      origin: default_origin(),
      timeout_ms: default_timeout_ms(),
      write_through: false,
      assets: default_assets(),
    }
  }
}

fn default_cache_name() -> String {
  "main-cache".to_string()
}

fn default_origin() -> String {
  "http://localhost:8000/".to_string()
}

fn default_timeout_ms() -> u64 {
  4000
}

fn default_assets() -> Vec<String> {
  let mut assets = vec!["./".to_string(), "./index.html".to_string()];
  assets.extend((1..=10).map(|n| format!("./img/{}.jpg", n)));
  assets.extend(
    [
      "./img/favicon.png",
      "./img/icon.png",
      "./js/main.js",
      "./js/restaurantInfo.js",
      "./build/js/app-min.js",
      "./build/css/app.min.css",
      "https://unpkg.com/leaflet@1.3.1/dist/leaflet.css",
      "https://unpkg.com/leaflet@1.3.1/dist/leaflet.js",
      "https://use.fontawesome.com/releases/v5.1.0/css/all.css",
    ]
    .iter()
    .map(|s| s.to_string()),
  );
  assets
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./restodir.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/restodir/config.yaml
  ///
  /// Falls back to built-in defaults when no file is found. The
  /// `RESTODIR_API_URL` environment variable overrides `api.base_url`.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };

    if let Ok(url) = std::env::var("RESTODIR_API_URL") {
      config.api.base_url = url;
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("restodir.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("restodir").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Directory holding the record store, asset cache and log files.
  pub fn data_dir(&self) -> Result<PathBuf> {
    if let Some(path) = &self.database.path {
      return Ok(path.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("restodir"))
  }
}
