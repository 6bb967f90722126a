//! Persistence ports and their implementations.
//!
//! Two interchangeable content backends satisfy the same contract:
//!   - `LocalBackend`: a device-local key/value store, the whole tree under one key
//!   - `DocumentBackend`: a document database with one collection per entity kind
//!
//! Session and profile records always live in the key/value store.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{Era, Language, User, UserProfile};

pub mod document;
pub mod local;

pub use document::DocumentBackend;
pub use local::LocalBackend;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt record '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Read/write the full content tree of one language.
#[async_trait]
pub trait ContentBackend: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet for this language.
    async fn load(&self, lang: Language) -> Result<Option<Vec<Era>>, StorageError>;
    async fn save(&self, lang: Language, eras: &[Era]) -> Result<(), StorageError>;
    fn name(&self) -> &'static str;
}

/// Live sessions (token -> user, one record for all of them) and progress records by user id.
#[async_trait]
pub trait ProfileRepo: Send + Sync {
    async fn load_sessions(&self) -> Result<Option<HashMap<String, User>>, StorageError>;
    async fn save_sessions(&self, sessions: &HashMap<String, User>) -> Result<(), StorageError>;
    async fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StorageError>;
    async fn save_profile(&self, profile: &UserProfile) -> Result<(), StorageError>;
}
