//! Dashboard figures derived from the content tree and a user's profile.

use serde::Serialize;

use crate::domain::{Era, Event, Topic, UserProfile};

const FREQUENT_TOPICS: usize = 3;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicProgress {
  pub topic: Topic,
  pub completed_count: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ContinueReading {
  pub topic: Topic,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub event: Option<Event>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
  pub featured_topics: Vec<Topic>,
  pub frequent_topics: Vec<TopicProgress>,
  pub completed_events: usize,
  pub total_events: usize,
  pub daily_streak: u32,
  pub high_score: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub continue_reading: Option<ContinueReading>,
}

fn topics(eras: &[Era]) -> impl Iterator<Item = &Topic> {
  eras.iter().flat_map(|e| e.topics.iter())
}

pub fn featured_topics(eras: &[Era]) -> Vec<Topic> {
  topics(eras).filter(|t| t.is_featured).cloned().collect()
}

/// Topics the user has completed events in, most completed first (stable on ties).
pub fn frequent_topics(eras: &[Era], profile: &UserProfile) -> Vec<TopicProgress> {
  let mut out: Vec<TopicProgress> = topics(eras)
    .map(|t| TopicProgress {
      completed_count: t.events.iter().filter(|e| profile.completed_event_ids.contains(&e.id)).count(),
      topic: t.clone(),
    })
    .filter(|p| p.completed_count > 0)
    .collect();
  out.sort_by(|a, b| b.completed_count.cmp(&a.completed_count));
  out.truncate(FREQUENT_TOPICS);
  out
}

/// Resolve the last viewed topic/event ids against the current tree.
pub fn continue_reading(eras: &[Era], profile: &UserProfile) -> Option<ContinueReading> {
  let topic = topics(eras).find(|t| Some(t.id) == profile.last_viewed_topic_id)?;
  let event = profile
    .last_viewed_event_id
    .and_then(|id| topic.events.iter().find(|e| e.id == id))
    .cloned();
  Some(ContinueReading { topic: topic.clone(), event })
}

pub fn dashboard(eras: &[Era], profile: &UserProfile) -> Dashboard {
  Dashboard {
    featured_topics: featured_topics(eras),
    frequent_topics: frequent_topics(eras, profile),
    completed_events: profile.completed_event_ids.len(),
    total_events: topics(eras).map(|t| t.events.len()).sum(),
    daily_streak: profile.daily_streak,
    high_score: profile.global_quiz_stats.high_score,
    continue_reading: continue_reading(eras, profile),
  }
}
