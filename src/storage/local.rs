//! Device-local key/value storage: one JSON file per key inside a data directory.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tracing::{debug, instrument};

use super::{ContentBackend, ProfileRepo, StorageError};
use crate::domain::{Era, Language, User, UserProfile};

pub fn content_key(lang: Language) -> String {
  format!("islamicHistoryData_{}", lang.code())
}

const SESSIONS_KEY: &str = "sessions";

fn profile_key(user_id: &str) -> String {
  format!("profile-{user_id}")
}

#[derive(Clone, Debug)]
pub struct LocalBackend {
  dir: PathBuf,
}

impl LocalBackend {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  fn path_for(&self, key: &str) -> PathBuf {
    // Keys are built by this module, but never let one escape the directory.
    let safe: String = key
      .chars()
      .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
      .collect();
    self.dir.join(format!("{safe}.json"))
  }

  pub async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
    match fs::read_to_string(self.path_for(key)).await {
      Ok(s) => Ok(Some(s)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  /// Write through a temp file and rename so readers never see a half-written value.
  pub async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
    fs::create_dir_all(&self.dir).await?;
    let path = self.path_for(key);
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, value).await?;
    fs::rename(&tmp, &path).await?;
    debug!(target: "storage", %key, bytes = value.len(), "stored item");
    Ok(())
  }

  async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
    let Some(raw) = self.get_item(key).await? else { return Ok(None) };
    serde_json::from_str(&raw)
      .map(Some)
      .map_err(|source| StorageError::Corrupt { key: key.to_string(), source })
  }

  async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    self.set_item(key, &raw).await
  }
}

#[async_trait]
impl ContentBackend for LocalBackend {
  #[instrument(level = "debug", skip(self), fields(%lang))]
  async fn load(&self, lang: Language) -> Result<Option<Vec<Era>>, StorageError> {
    self.get_json(&content_key(lang)).await
  }

  #[instrument(level = "debug", skip(self, eras), fields(%lang, eras = eras.len()))]
  async fn save(&self, lang: Language, eras: &[Era]) -> Result<(), StorageError> {
    self.set_json(&content_key(lang), eras).await
  }

  fn name(&self) -> &'static str {
    "local"
  }
}

#[async_trait]
impl ProfileRepo for LocalBackend {
  async fn load_sessions(&self) -> Result<Option<HashMap<String, User>>, StorageError> {
    self.get_json(SESSIONS_KEY).await
  }

  async fn save_sessions(&self, sessions: &HashMap<String, User>) -> Result<(), StorageError> {
    self.set_json(SESSIONS_KEY, sessions).await
  }

  async fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StorageError> {
    self.get_json(&profile_key(user_id)).await
  }

  async fn save_profile(&self, profile: &UserProfile) -> Result<(), StorageError> {
    self.set_json(&profile_key(&profile.user_id), profile).await
  }
}
