//! Server configuration: optional TOML file plus environment overrides.
//!
//! `CHRONICLE_CONFIG_PATH` points to a TOML file such as:
//!
//! ```toml
//! dataset_dir = "./static/data"
//! static_dir = "./static"
//!
//! [storage]
//! backend = "document"   # or "local"
//! dir = "./var"
//! ```
//!
//! Missing or unreadable files fall back to defaults.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Copy, Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
  #[default]
  Local,
  Document,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StorageCfg {
  #[serde(default)] pub backend: BackendKind,
  #[serde(default = "default_storage_dir")] pub dir: PathBuf,
}

impl Default for StorageCfg {
  fn default() -> Self {
    Self { backend: BackendKind::default(), dir: default_storage_dir() }
  }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
  #[serde(default)] pub storage: StorageCfg,
  /// Where the static seed datasets live.
  #[serde(default = "default_dataset_dir")] pub dataset_dir: PathBuf,
  /// Built SPA served for every non-API path.
  #[serde(default = "default_static_dir")] pub static_dir: PathBuf,
  #[serde(default = "default_port")] pub port: u16,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      storage: StorageCfg::default(),
      dataset_dir: default_dataset_dir(),
      static_dir: default_static_dir(),
      port: default_port(),
    }
  }
}

fn default_storage_dir() -> PathBuf { PathBuf::from("./var") }
fn default_dataset_dir() -> PathBuf { PathBuf::from("./static/data") }
fn default_static_dir() -> PathBuf { PathBuf::from("./static") }
fn default_port() -> u16 { 3000 }

impl AppConfig {
  /// Config file (if any), then `PORT` on top.
  pub fn from_env() -> Self {
    let mut cfg = load_config_file_from_env().unwrap_or_default();
    if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
      cfg.port = port;
    }
    cfg
  }
}

/// Attempt to load `AppConfig` from CHRONICLE_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_file_from_env() -> Option<AppConfig> {
  let path = std::env::var("CHRONICLE_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "chronicle_backend", %path, "Loaded config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "chronicle_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "chronicle_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
