//! Application state: one content store per language, the session store and
//! the quiz service, built once at startup and shared by every handler.
//!
//! The content backend (local key/value vs document collections) is chosen by
//! configuration; sessions and profiles always live in the key/value store.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::{AppConfig, BackendKind};
use crate::domain::Language;
use crate::error::ApiError;
use crate::quiz::QuizService;
use crate::session::{Clock, SessionStore, SystemClock};
use crate::storage::{ContentBackend, DocumentBackend, LocalBackend, ProfileRepo};
use crate::store::ContentStore;

pub struct AppState {
    pub content: HashMap<Language, Arc<ContentStore>>,
    pub sessions: SessionStore,
    pub quiz: QuizService,
}

impl AppState {
    pub fn new(
        content_backend: Arc<dyn ContentBackend>,
        profiles: Arc<dyn ProfileRepo>,
        clock: Arc<dyn Clock>,
        dataset_dir: &std::path::Path,
        quiz: QuizService,
    ) -> Self {
        let content = Language::ALL
            .into_iter()
            .map(|lang| (lang, Arc::new(ContentStore::new(lang, content_backend.clone(), dataset_dir))))
            .collect();
        Self { content, sessions: SessionStore::new(profiles, clock), quiz }
    }

    /// Build state from config and load every language's content once.
    #[instrument(level = "info", skip_all)]
    pub async fn from_config(cfg: &AppConfig) -> Self {
        let local = Arc::new(LocalBackend::new(&cfg.storage.dir));
        let content_backend: Arc<dyn ContentBackend> = match cfg.storage.backend {
            BackendKind::Local => local.clone(),
            BackendKind::Document => Arc::new(DocumentBackend::new(cfg.storage.dir.join("documents"))),
        };
        info!(target: "chronicle_backend", backend = content_backend.name(), dir = %cfg.storage.dir.display(), "Content backend selected");

        let quiz = QuizService::load(&cfg.dataset_dir).await;
        let state = Self::new(content_backend, local, Arc::new(SystemClock), &cfg.dataset_dir, quiz);
        state.load_all().await;
        state
    }

    pub async fn load_all(&self) {
        for store in self.content.values() {
            let source = store.load().await;
            info!(target: "content", lang = %store.language(), ?source, "Startup content inventory");
        }
    }

    pub fn content(&self, lang: Language) -> Result<&ContentStore, ApiError> {
        self.content
            .get(&lang)
            .map(Arc::as_ref)
            .ok_or_else(|| ApiError::NotFound(format!("no content for language '{lang}'")))
    }
}
