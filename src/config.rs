use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable that overrides `cache.generation`.
pub const GENERATION_ENV: &str = "SWCACHE_GENERATION";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Origin of the pages this worker controls, e.g. "https://app.example"
  pub origin: String,
  pub cache: CacheConfig,
  pub network: NetworkConfig,
  pub notifications: NotificationConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      origin: "http://localhost:8000".to_string(),
      cache: CacheConfig::default(),
      network: NetworkConfig::default(),
      notifications: NotificationConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Name of the current cache generation. Bump on deploy to sweep old stores.
  pub generation: String,
  /// When false, nothing is cached and every intercepted request goes to the network.
  /// An existing database is still swept on activation.
  pub enabled: bool,
  /// Cache database location (defaults to $XDG_DATA_HOME/swcache/cache.db)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      generation: "static-cache-v1".to_string(),
      enabled: true,
      path: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
  pub timeout_secs: u64,
}

impl Default for NetworkConfig {
  fn default() -> Self {
    Self { timeout_secs: 30 }
  }
}

/// How push payloads are turned into notifications.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
  pub icon: String,
  pub badge: String,
  /// Directory holding "<sound>.mp3" files
  pub sound_dir: String,
  /// Used when the payload asks for vibration
  pub vibration_pattern: Vec<u32>,
  pub default_title: String,
  pub default_body: String,
  pub default_url: String,
}

impl Default for NotificationConfig {
  fn default() -> Self {
    Self {
      icon: "/static/images/icons/icon-192x192.png".to_string(),
      badge: "/static/images/icons/icon-192x192.png".to_string(),
      sound_dir: "/static/sounds".to_string(),
      vibration_pattern: vec![200, 100, 200],
      default_title: "Notification".to_string(),
      default_body: "You have a new message".to_string(),
      default_url: "/".to_string(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./swcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/swcache/config.yaml
  ///
  /// Built-in defaults apply when no file is found. `SWCACHE_GENERATION`
  /// overrides the cache generation either way.
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

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => {
        tracing::debug!("No configuration file found, using defaults");
        Self::default()
      }
    };

    config
      .with_generation_override(std::env::var(GENERATION_ENV).ok())
      .validated()
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("swcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("swcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    // An empty file deserializes to null
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))
  }

  /// Replace the cache generation if an override is set and non-empty.
  pub fn with_generation_override(mut self, generation: Option<String>) -> Self {
    if let Some(generation) = generation.filter(|g| !g.trim().is_empty()) {
      self.cache.generation = generation.trim().to_string();
    }
    self
  }

  fn validated(self) -> Result<Self> {
    self.origin_url()?;
    if self.cache.generation.trim().is_empty() {
      return Err(eyre!("cache.generation must not be empty"));
    }
    if self.network.timeout_secs == 0 {
      return Err(eyre!("network.timeout_secs must be at least 1"));
    }
    Ok(self)
  }

  /// The page origin as a URL, used to resolve relative notification targets.
  pub fn origin_url(&self) -> Result<Url> {
    Url::parse(&self.origin).map_err(|e| eyre!("Invalid origin '{}': {}", self.origin, e))
  }
}
