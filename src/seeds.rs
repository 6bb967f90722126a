//! Static seed datasets shipped next to the frontend (`/data/*.json`).
//!
//! - `rawHistoricalData{_bn}.json`: the content tree without ids
//! - `mockQuizData{_bn}.json`: the global quiz bank
//! - `leaderboardData.json`: the baseline leaderboard
//!
//! Any failure is reported to the caller, which degrades to an empty dataset.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::{info, instrument};

use crate::content::assign_ids;
use crate::domain::{Era, GlobalQuizItem, Language, LeaderboardPlayer};

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
  #[error("failed to read {path}: {source}")]
  Read { path: PathBuf, #[source] source: std::io::Error },
  #[error("failed to parse {path}: {source}")]
  Parse { path: PathBuf, #[source] source: serde_json::Error },
  #[error("{path} is empty")]
  Empty { path: PathBuf },
}

pub fn eras_file(dir: &Path, lang: Language) -> PathBuf {
  dir.join(format!("rawHistoricalData{}.json", lang.file_suffix()))
}

pub fn quiz_file(dir: &Path, lang: Language) -> PathBuf {
  dir.join(format!("mockQuizData{}.json", lang.file_suffix()))
}

pub fn leaderboard_file(dir: &Path) -> PathBuf {
  dir.join("leaderboardData.json")
}

async fn read_json<T: DeserializeOwned>(path: PathBuf) -> Result<T, SeedError> {
  let raw = tokio::fs::read_to_string(&path)
    .await
    .map_err(|source| SeedError::Read { path: path.clone(), source })?;
  if raw.trim().is_empty() {
    return Err(SeedError::Empty { path });
  }
  serde_json::from_str(&raw).map_err(|source| SeedError::Parse { path, source })
}

/// Load the raw content tree for `lang` and number it.
#[instrument(level = "info", skip(dir), fields(%lang))]
pub async fn load_seed_eras(dir: &Path, lang: Language) -> Result<Vec<Era>, SeedError> {
  let path = eras_file(dir, lang);
  let raw: serde_json::Value = read_json(path.clone()).await?;
  let eras = assign_ids(raw).map_err(|source| SeedError::Parse { path: path.clone(), source })?;
  info!(target: "content", path = %path.display(), eras = eras.len(), "Loaded seed dataset");
  Ok(eras)
}

pub async fn load_quiz_bank(dir: &Path, lang: Language) -> Result<Vec<GlobalQuizItem>, SeedError> {
  read_json(quiz_file(dir, lang)).await
}

pub async fn load_leaderboard(dir: &Path) -> Result<Vec<LeaderboardPlayer>, SeedError> {
  read_json(leaderboard_file(dir)).await
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[tokio::test]
  async fn seed_eras_get_sequential_ids() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
      dir.path().join("rawHistoricalData_bn.json"),
      r#"[{"title":"A","description":"","topics":[{"name":"n","title":"t","period":"p","bio":"b","events":[{"year":"1","title":"e","story":"s"}]}]}]"#,
    )
    .unwrap();

    let eras = load_seed_eras(dir.path(), Language::Bn).await.unwrap();
    assert_eq!(eras[0].id, 1);
    assert_eq!(eras[0].topics[0].events[0].id, 1);
    assert!(load_seed_eras(dir.path(), Language::En).await.is_err());
  }

  #[tokio::test]
  async fn empty_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    std::fs::write(leaderboard_file(dir.path()), "  \n").unwrap();
    assert!(matches!(load_leaderboard(dir.path()).await, Err(SeedError::Empty { .. })));
  }
}
