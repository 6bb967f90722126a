//! Pure operations over the Era → Topic → Event tree.
//!
//! Every function borrows the current tree and returns a brand new one; the
//! input is never touched. The store swaps the result in and persists it.
//!
//! Ids:
//!   - eras are numbered among eras,
//!   - topics and events are numbered across the whole tree,
//!   - a new id is `max(existing) + 1`, or `1` for an empty collection.

use serde_json::Value;

use crate::domain::{Era, EraId, Event, EventDraft, EventId, Topic, TopicDraft, TopicId};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("era {0} not found")]
    EraNotFound(EraId),
    #[error("topic {0} not found")]
    TopicNotFound(TopicId),
    #[error("event {event_id} not found in topic {topic_id}")]
    EventNotFound { topic_id: TopicId, event_id: EventId },
    #[error("index out of range: from={from} to={to} len={len}")]
    IndexOutOfRange { from: usize, to: usize, len: usize },
    #[error("{0}")]
    InvalidImport(String),
}

pub type ContentResult = Result<Vec<Era>, ContentError>;

pub fn next_id(ids: impl IntoIterator<Item = u64>) -> u64 {
    ids.into_iter().max().map_or(1, |max| max + 1)
}

/// Move the item at `from` to position `to` (remove, then reinsert).
pub fn reorder<T: Clone>(list: &[T], from: usize, to: usize) -> Result<Vec<T>, ContentError> {
    let len = list.len();
    if from >= len || to >= len {
        return Err(ContentError::IndexOutOfRange { from, to, len });
    }
    let mut out = list.to_vec();
    let moved = out.remove(from);
    out.insert(to, moved);
    Ok(out)
}

fn all_topics(eras: &[Era]) -> impl Iterator<Item = &Topic> {
    eras.iter().flat_map(|era| era.topics.iter())
}

fn all_events(eras: &[Era]) -> impl Iterator<Item = &Event> {
    all_topics(eras).flat_map(|topic| topic.events.iter())
}

fn contains_topic(eras: &[Era], topic_id: TopicId) -> bool {
    all_topics(eras).any(|t| t.id == topic_id)
}

/// Apply `f` to the topic with `topic_id`, rebuilding the tree around it.
fn map_topic<F>(eras: &[Era], topic_id: TopicId, f: F) -> ContentResult
where
    F: FnOnce(&Topic) -> Result<Topic, ContentError>,
{
    let mut f = Some(f);
    let mut out = Vec::with_capacity(eras.len());
    for era in eras {
        let mut topics = Vec::with_capacity(era.topics.len());
        for topic in &era.topics {
            match (topic.id == topic_id, f.take()) {
                (true, Some(apply)) => topics.push(apply(topic)?),
                (_, rest) => {
                    f = rest;
                    topics.push(topic.clone());
                }
            }
        }
        out.push(Era { topics, ..era.clone() });
    }
    if f.is_some() {
        return Err(ContentError::TopicNotFound(topic_id));
    }
    Ok(out)
}

fn map_era<F>(eras: &[Era], era_id: EraId, f: F) -> ContentResult
where
    F: FnOnce(&Era) -> Result<Era, ContentError>,
{
    let idx = eras
        .iter()
        .position(|e| e.id == era_id)
        .ok_or(ContentError::EraNotFound(era_id))?;
    let mut out = eras.to_vec();
    out[idx] = f(&eras[idx])?;
    Ok(out)
}

pub fn add_era(eras: &[Era], title: &str, description: &str) -> ContentResult {
    let era = Era {
        id: next_id(eras.iter().map(|e| e.id)),
        title: title.to_string(),
        description: description.to_string(),
        topics: Vec::new(),
    };
    let mut out = eras.to_vec();
    out.push(era);
    Ok(out)
}

pub fn update_era(eras: &[Era], updated: Era) -> ContentResult {
    map_era(eras, updated.id, |_| Ok(updated))
}

pub fn add_topic(eras: &[Era], era_id: EraId, draft: TopicDraft) -> ContentResult {
    let id = next_id(all_topics(eras).map(|t| t.id));
    map_era(eras, era_id, |era| {
        let mut era = era.clone();
        era.topics.push(Topic {
            id,
            name: draft.name,
            title: draft.title,
            period: draft.period,
            bio: draft.bio,
            is_featured: draft.is_featured.unwrap_or(false),
            events: Vec::new(),
        });
        Ok(era)
    })
}

pub fn update_topic(eras: &[Era], updated: Topic) -> ContentResult {
    map_topic(eras, updated.id, |_| Ok(updated))
}

/// Remove a topic and, with it, all of its events. Eras are left in place even when emptied.
pub fn delete_topic(eras: &[Era], topic_id: TopicId) -> ContentResult {
    if !contains_topic(eras, topic_id) {
        return Err(ContentError::TopicNotFound(topic_id));
    }
    Ok(eras
        .iter()
        .map(|era| Era {
            topics: era.topics.iter().filter(|t| t.id != topic_id).cloned().collect(),
            ..era.clone()
        })
        .collect())
}

pub fn add_event(eras: &[Era], topic_id: TopicId, draft: EventDraft) -> ContentResult {
    let id = next_id(all_events(eras).map(|e| e.id));
    map_topic(eras, topic_id, |topic| {
        let mut topic = topic.clone();
        topic.events.push(draft.with_id(id));
        Ok(topic)
    })
}

pub fn update_event(eras: &[Era], topic_id: TopicId, updated: Event) -> ContentResult {
    map_topic(eras, topic_id, |topic| {
        let idx = topic
            .events
            .iter()
            .position(|e| e.id == updated.id)
            .ok_or(ContentError::EventNotFound { topic_id, event_id: updated.id })?;
        let mut topic = topic.clone();
        topic.events[idx] = updated;
        Ok(topic)
    })
}

pub fn delete_event(eras: &[Era], topic_id: TopicId, event_id: EventId) -> ContentResult {
    map_topic(eras, topic_id, |topic| {
        if !topic.events.iter().any(|e| e.id == event_id) {
            return Err(ContentError::EventNotFound { topic_id, event_id });
        }
        Ok(Topic {
            events: topic.events.iter().filter(|e| e.id != event_id).cloned().collect(),
            ..topic.clone()
        })
    })
}

pub fn reorder_eras(eras: &[Era], from: usize, to: usize) -> ContentResult {
    reorder(eras, from, to)
}

pub fn reorder_topics(eras: &[Era], era_id: EraId, from: usize, to: usize) -> ContentResult {
    map_era(eras, era_id, |era| {
        Ok(Era { topics: reorder(&era.topics, from, to)?, ..era.clone() })
    })
}

pub fn reorder_events(eras: &[Era], topic_id: TopicId, from: usize, to: usize) -> ContentResult {
    map_topic(eras, topic_id, |topic| {
        Ok(Topic { events: reorder(&topic.events, from, to)?, ..topic.clone() })
    })
}

/// Number every era, topic and event of a raw dataset sequentially from 1, in document order.
/// The static dataset files ship without ids.
pub fn assign_ids(raw: Value) -> Result<Vec<Era>, serde_json::Error> {
    let mut raw = raw;
    let (mut era_id, mut topic_id, mut event_id) = (1u64, 1u64, 1u64);
    if let Value::Array(eras) = &mut raw {
        for era in eras.iter_mut() {
            set_id(era, &mut era_id);
            for topic in children(era, "topics") {
                set_id(topic, &mut topic_id);
                for event in children(topic, "events") {
                    set_id(event, &mut event_id);
                }
            }
        }
    }
    serde_json::from_value(raw)
}

fn set_id(node: &mut Value, counter: &mut u64) {
    if let Value::Object(map) = node {
        map.insert("id".into(), Value::from(*counter));
        *counter += 1;
    }
}

fn children<'a>(node: &'a mut Value, key: &str) -> impl Iterator<Item = &'a mut Value> {
    node.get_mut(key)
        .and_then(Value::as_array_mut)
        .map(|list| list.iter_mut())
        .into_iter()
        .flatten()
}

/// Shallow shape check for an imported dataset, then typed decode.
/// Accepts an empty array, or an array whose first element has `title` and `topics`.
pub fn validate_import(raw: Value) -> ContentResult {
    let shape_ok = match &raw {
        Value::Array(items) => match items.first() {
            None => true,
            Some(first) => first.get("title").is_some() && first.get("topics").is_some(),
        },
        _ => false,
    };
    if !shape_ok {
        return Err(ContentError::InvalidImport(
            "JSON file is not in the expected format for Historical Eras.".into(),
        ));
    }
    serde_json::from_value(raw).map_err(|e| ContentError::InvalidImport(e.to_string()))
}
