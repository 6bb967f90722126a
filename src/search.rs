//! Case-insensitive substring search over topics and events.

use std::collections::HashSet;

use serde::Serialize;

use crate::domain::{Era, Event, Topic};

/// Queries shorter than this return nothing.
pub const MIN_QUERY_CHARS: usize = 2;

/// A matching topic, or a matching event together with the topic it belongs to.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SearchHit {
  pub topic: Topic,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub event: Option<Event>,
}

impl SearchHit {
  fn key(&self) -> String {
    match &self.event {
      Some(e) => format!("event-{}", e.id),
      None => format!("topic-{}", self.topic.id),
    }
  }
}

/// Topics match on name or bio, events on title or story. Results keep tree order
/// and each topic/event appears at most once.
pub fn search(eras: &[Era], query: &str) -> Vec<SearchHit> {
  if query.chars().count() < MIN_QUERY_CHARS {
    return Vec::new();
  }
  let needle = query.to_lowercase();
  let matches = |s: &str| s.to_lowercase().contains(&needle);

  let mut seen = HashSet::new();
  let mut hits = Vec::new();
  for topic in eras.iter().flat_map(|e| &e.topics) {
    if matches(&topic.name) || matches(&topic.bio) {
      hits.push(SearchHit { topic: topic.clone(), event: None });
    }
    for event in &topic.events {
      if matches(&event.title) || matches(&event.story) {
        hits.push(SearchHit { topic: topic.clone(), event: Some(event.clone()) });
      }
    }
  }
  hits.retain(|h| seen.insert(h.key()));
  hits
}
