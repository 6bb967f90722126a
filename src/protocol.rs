//! Request/response DTOs for the HTTP API (serde ready).
//! Entities themselves (`Era`, `Topic`, `Event`, `UserProfile`) go over the wire as-is.

use serde::{Deserialize, Serialize};

use crate::domain::{EventId, Language, TopicId, User, UserProfile, UserProvider};
use crate::quiz::QuizResult;
use crate::session::Session;

/// Header carrying the token returned by `POST /session`.
pub const SESSION_HEADER: &str = "x-session-token";

#[derive(Debug, Default, Deserialize)]
pub struct LangQuery {
    #[serde(default)]
    pub lang: Language,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub lang: Language,
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct NewEraIn {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Drag-and-drop move: item at `from` ends up at `to`.
#[derive(Debug, Deserialize)]
pub struct ReorderIn {
    #[serde(alias = "startIndex")]
    pub from: usize,
    #[serde(alias = "endIndex")]
    pub to: usize,
}

#[derive(Debug, Deserialize)]
pub struct LoginIn {
    pub provider: UserProvider,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOut {
    pub token: String,
    pub user: User,
    pub profile: Option<UserProfile>,
    pub is_admin: bool,
}

impl From<Session> for SessionOut {
    fn from(s: Session) -> Self {
        let is_admin = s.is_admin();
        Self { token: s.token, user: s.user, profile: s.profile, is_admin }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedIn {
    pub event_id: EventId,
}

#[derive(Debug, Deserialize)]
pub struct QuizScoreIn {
    pub score: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastViewedIn {
    pub topic_id: TopicId,
    pub event_id: EventId,
}

/// Profile after a mutation; `null` for sessions that keep no profile (guest, admin).
#[derive(Debug, Serialize)]
pub struct ProfileOut {
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Deserialize)]
pub struct QuizSubmitIn {
    #[serde(default)]
    pub answers: Vec<Option<usize>>,
}

#[derive(Debug, Serialize)]
pub struct QuizSubmitOut {
    #[serde(flatten)]
    pub result: QuizResult,
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Serialize)]
pub struct ImportOut {
    pub eras: usize,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
