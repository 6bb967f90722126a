//! Domain models used by the backend: the Era/Topic/Event content tree,
//! users and their progress profile, and the global quiz/leaderboard records.
//!
//! All records serialize as camelCase JSON so the browser client and the
//! static dataset files can be read and written unchanged.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type EraId = u64;
pub type TopicId = u64;
pub type EventId = u64;

/// Content language. Every language has its own independent content tree.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  #[default]
  En,
  Bn,
}

impl Language {
  pub const ALL: [Language; 2] = [Language::En, Language::Bn];

  pub fn code(self) -> &'static str {
    match self {
      Language::En => "en",
      Language::Bn => "bn",
    }
  }

  /// Suffix used by the static dataset files (`rawHistoricalData_bn.json`).
  pub fn file_suffix(self) -> &'static str {
    match self {
      Language::En => "",
      Language::Bn => "_bn",
    }
  }
}

impl fmt::Display for Language {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.code())
  }
}

/// Top-level chronological grouping of topics. Position in the list is the display order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Era {
  pub id: EraId,
  pub title: String,
  pub description: String,
  #[serde(default)] pub topics: Vec<Topic>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
  pub id: TopicId,
  pub name: String,
  pub title: String,
  pub period: String,
  pub bio: String,
  #[serde(default)] pub is_featured: bool,
  #[serde(default)] pub events: Vec<Event>,
}

/// A dated story unit with narrative, quiz, glossary and an optional map location.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Event {
  pub id: EventId,
  pub year: String,
  pub title: String,
  pub story: String,
  #[serde(default)] pub lessons: Vec<String>,
  #[serde(default)] pub glossary: Vec<GlossaryItem>,
  #[serde(default)] pub quiz: Vec<QuizItem>,
  #[serde(default)] pub images: Vec<StoryImage>,
  #[serde(default)] pub quotes: Vec<Quote>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub location: Option<Location>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Location {
  pub name: String,
  pub coords: Coords,
  pub zoom: f64,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Coords {
  pub lat: f64,
  pub lng: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GlossaryItem {
  pub term: String,
  pub explanation: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Quote {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub arabic: Option<String>,
  pub translation: String,
  pub source: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizItem {
  pub question: String,
  pub options: Vec<String>,
  pub correct_answer_index: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StoryImage {
  pub src: String,
  pub caption: String,
}

/// Fields accepted when creating a topic. The id is assigned by the store.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicDraft {
  pub name: String,
  pub title: String,
  pub period: String,
  pub bio: String,
  #[serde(default)] pub is_featured: Option<bool>,
}

/// An event without its id, as submitted by the editor.
#[derive(Clone, Debug, Deserialize)]
pub struct EventDraft {
  pub year: String,
  pub title: String,
  pub story: String,
  #[serde(default)] pub lessons: Vec<String>,
  #[serde(default)] pub glossary: Vec<GlossaryItem>,
  #[serde(default)] pub quiz: Vec<QuizItem>,
  #[serde(default)] pub images: Vec<StoryImage>,
  #[serde(default)] pub quotes: Vec<Quote>,
  #[serde(default)] pub location: Option<Location>,
}

impl EventDraft {
  pub fn with_id(self, id: EventId) -> Event {
    Event {
      id,
      year: self.year,
      title: self.title,
      story: self.story,
      lessons: self.lessons,
      glossary: self.glossary,
      quiz: self.quiz,
      images: self.images,
      quotes: self.quotes,
      location: self.location,
    }
  }
}

/// Which identity provider the user logged in with.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserProvider {
  Google,
  Facebook,
  Guest,
  Admin,
}

impl UserProvider {
  /// Only real provider accounts keep a progress profile.
  pub fn tracks_progress(self) -> bool {
    matches!(self, UserProvider::Google | UserProvider::Facebook)
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id: String,
  pub name: String,
  pub avatar_url: String,
  pub provider: UserProvider,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizStats {
  pub high_score: u32,
  pub last_score: u32,
  pub last_played: DateTime<Utc>,
}

/// Per-user progress record: completed events, daily streak and quiz score.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
  pub user_id: String,
  #[serde(default)] pub completed_event_ids: Vec<EventId>,
  #[serde(default)] pub daily_streak: u32,
  pub last_login: DateTime<Utc>,
  pub global_quiz_stats: QuizStats,
  #[serde(default)] pub last_viewed_topic_id: Option<TopicId>,
  #[serde(default)] pub last_viewed_event_id: Option<EventId>,
}

impl UserProfile {
  /// Fresh profile: no progress, last login at the epoch so the first load starts a streak.
  pub fn new(user_id: impl Into<String>) -> Self {
    Self {
      user_id: user_id.into(),
      completed_event_ids: Vec::new(),
      daily_streak: 0,
      last_login: DateTime::<Utc>::UNIX_EPOCH,
      global_quiz_stats: QuizStats {
        high_score: 0,
        last_score: 0,
        last_played: DateTime::<Utc>::UNIX_EPOCH,
      },
      last_viewed_topic_id: None,
      last_viewed_event_id: None,
    }
  }
}

/// Question in the cross-topic quiz bank.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GlobalQuizItem {
  pub question: String,
  pub options: Vec<String>,
  pub correct_answer_index: usize,
  #[serde(default)] pub explanation: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardPlayer {
  #[serde(default)] pub rank: u32,
  pub name: String,
  pub score: u32,
  #[serde(default)] pub avatar: String,
}
