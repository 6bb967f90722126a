//! Content store: the live Era/Topic/Event tree of one language.
//!
//! One store per language is built at startup and shared through `AppState`.
//! Mutations run the pure operation from `content`, swap the new tree in and
//! save it to the backend. A failed save is logged; the mutation still stands.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

use crate::content::{self, ContentResult};
use crate::domain::{Era, EraId, Event, EventDraft, EventId, Language, Topic, TopicDraft, TopicId};
use crate::seeds::load_seed_eras;
use crate::storage::ContentBackend;

/// Where the tree came from on startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadSource {
    Storage,
    Seed,
    Empty,
}

pub struct ContentStore {
    lang: Language,
    eras: RwLock<Vec<Era>>,
    backend: Arc<dyn ContentBackend>,
    dataset_dir: PathBuf,
}

impl ContentStore {
    pub fn new(lang: Language, backend: Arc<dyn ContentBackend>, dataset_dir: impl Into<PathBuf>) -> Self {
        Self { lang, eras: RwLock::new(Vec::new()), backend, dataset_dir: dataset_dir.into() }
    }

    pub fn language(&self) -> Language {
        self.lang
    }

    /// Read the backend once; when it holds nothing, fall back to the seed dataset.
    /// Never fails: anything unreadable leaves an empty tree.
    #[instrument(level = "info", skip(self), fields(lang = %self.lang, backend = self.backend.name()))]
    pub async fn load(&self) -> LoadSource {
        match self.backend.load(self.lang).await {
            Ok(Some(eras)) => {
                info!(target: "content", lang = %self.lang, eras = eras.len(), "Loaded content from storage");
                *self.eras.write().await = eras;
                return LoadSource::Storage;
            }
            Ok(None) => {}
            Err(e) => {
                // Keep the bad record on disk; an empty tree is served until the next mutation.
                error!(target: "content", lang = %self.lang, error = %e, "Stored content unreadable; starting empty");
                self.eras.write().await.clear();
                return LoadSource::Empty;
            }
        }

        match load_seed_eras(&self.dataset_dir, self.lang).await {
            Ok(eras) if !eras.is_empty() => {
                if let Err(e) = self.backend.save(self.lang, &eras).await {
                    error!(target: "content", lang = %self.lang, error = %e, "Failed to persist seed dataset");
                }
                *self.eras.write().await = eras;
                LoadSource::Seed
            }
            Ok(_) => LoadSource::Empty,
            Err(e) => {
                warn!(target: "content", lang = %self.lang, error = %e, "Seed dataset unavailable; starting empty");
                LoadSource::Empty
            }
        }
    }

    pub async fn eras(&self) -> Vec<Era> {
        self.eras.read().await.clone()
    }

    /// Run a pure tree operation, swap the result in and persist it.
    /// The write lock is held across the save so stored snapshots follow mutation order.
    async fn apply<F>(&self, op: &'static str, f: F) -> ContentResult
    where
        F: FnOnce(&[Era]) -> ContentResult,
    {
        let mut guard = self.eras.write().await;
        let next = match f(guard.as_slice()) {
            Ok(next) => next,
            Err(e) => {
                warn!(target: "content", lang = %self.lang, op, error = %e, "Content mutation rejected");
                return Err(e);
            }
        };
        *guard = next.clone();
        if let Err(e) = self.backend.save(self.lang, &next).await {
            error!(target: "content", lang = %self.lang, op, backend = self.backend.name(), error = %e, "Failed to persist content");
        }
        info!(target: "content", lang = %self.lang, op, eras = next.len(), "Content updated");
        Ok(next)
    }

    #[instrument(level = "debug", skip(self, description))]
    pub async fn add_era(&self, title: &str, description: &str) -> ContentResult {
        self.apply("add_era", |eras| content::add_era(eras, title, description)).await
    }

    #[instrument(level = "debug", skip(self, era), fields(era_id = era.id))]
    pub async fn update_era(&self, era: Era) -> ContentResult {
        self.apply("update_era", |eras| content::update_era(eras, era)).await
    }

    #[instrument(level = "debug", skip(self, draft))]
    pub async fn add_topic(&self, era_id: EraId, draft: TopicDraft) -> ContentResult {
        self.apply("add_topic", |eras| content::add_topic(eras, era_id, draft)).await
    }

    #[instrument(level = "debug", skip(self, topic), fields(topic_id = topic.id))]
    pub async fn update_topic(&self, topic: Topic) -> ContentResult {
        self.apply("update_topic", |eras| content::update_topic(eras, topic)).await
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn delete_topic(&self, topic_id: TopicId) -> ContentResult {
        self.apply("delete_topic", |eras| content::delete_topic(eras, topic_id)).await
    }

    #[instrument(level = "debug", skip(self, draft))]
    pub async fn add_event(&self, topic_id: TopicId, draft: EventDraft) -> ContentResult {
        self.apply("add_event", |eras| content::add_event(eras, topic_id, draft)).await
    }

    #[instrument(level = "debug", skip(self, event), fields(event_id = event.id))]
    pub async fn update_event(&self, topic_id: TopicId, event: Event) -> ContentResult {
        self.apply("update_event", |eras| content::update_event(eras, topic_id, event)).await
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn delete_event(&self, topic_id: TopicId, event_id: EventId) -> ContentResult {
        self.apply("delete_event", |eras| content::delete_event(eras, topic_id, event_id)).await
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn reorder_eras(&self, from: usize, to: usize) -> ContentResult {
        self.apply("reorder_eras", |eras| content::reorder_eras(eras, from, to)).await
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn reorder_topics(&self, era_id: EraId, from: usize, to: usize) -> ContentResult {
        self.apply("reorder_topics", |eras| content::reorder_topics(eras, era_id, from, to)).await
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn reorder_events(&self, topic_id: TopicId, from: usize, to: usize) -> ContentResult {
        self.apply("reorder_events", |eras| content::reorder_events(eras, topic_id, from, to)).await
    }

    /// Replace the whole tree. Validation failures leave the current tree untouched.
    #[instrument(level = "info", skip(self, raw))]
    pub async fn import_data(&self, raw: Value) -> ContentResult {
        let imported = content::validate_import(raw);
        self.apply("import_data", move |_| imported).await
    }

    /// Pretty JSON array of the whole tree, the same shape `import_data` accepts.
    pub async fn export(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&*self.eras.read().await)
    }
}
