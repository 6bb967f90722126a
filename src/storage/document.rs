//! Document-database layout for the content tree.
//!
//! Each language owns three collections, `eras_{lang}`, `topics_{lang}` and
//! `events_{lang}`. A document holds the entity fields (without its child
//! list), a generated document id, a 1-based `order` within its parent and a
//! link to the parent document (`eraId` / `topicId`).
//!
//! Collections are written one after another. There is no transaction across
//! them: if the second write fails the first is already on disk. Loading
//! skips documents whose parent is missing.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{ContentBackend, StorageError};
use crate::domain::{Era, Language};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Kind {
    Era,
    Topic,
    Event,
}

impl Kind {
    fn collection(self, lang: Language) -> String {
        let base = match self {
            Kind::Era => "eras",
            Kind::Topic => "topics",
            Kind::Event => "events",
        };
        format!("{base}_{}", lang.code())
    }

    fn children_key(self) -> Option<&'static str> {
        match self {
            Kind::Era => Some("topics"),
            Kind::Topic => Some("events"),
            Kind::Event => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Document {
    #[serde(rename = "docId")]
    doc_id: String,
    order: usize,
    #[serde(rename = "eraId", default, skip_serializing_if = "Option::is_none")]
    era_id: Option<String>,
    #[serde(rename = "topicId", default, skip_serializing_if = "Option::is_none")]
    topic_id: Option<String>,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Document {
    fn entity_id(&self) -> Option<u64> {
        self.fields.get("id").and_then(Value::as_u64)
    }
}

pub struct DocumentBackend {
    dir: PathBuf,
    /// Document ids handed out so far, so an entity keeps its document across saves.
    doc_ids: Mutex<HashMap<(Language, Kind, u64), String>>,
}

impl DocumentBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), doc_ids: Mutex::new(HashMap::new()) }
    }

    fn path_for(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }

    async fn read_collection(&self, collection: &str) -> Result<Option<Vec<Document>>, StorageError> {
        let raw = match fs::read_to_string(self.path_for(collection)).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Corrupt { key: collection.to_string(), source })
    }

    async fn write_collection(&self, collection: &str, docs: &[Document]) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).await?;
        let raw = serde_json::to_string_pretty(docs)?;
        let path = self.path_for(collection);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Split an entity into its own document, returning the document and its children.
    fn to_document(
        kind: Kind,
        value: Value,
        order: usize,
        doc_id: String,
        parent: Option<&str>,
    ) -> Result<(Document, Vec<Value>), StorageError> {
        let mut fields = match value {
            Value::Object(map) => map,
            other => {
                return Err(StorageError::Serialization(serde::ser::Error::custom(format!(
                    "expected object for {kind:?}, got {other}"
                ))))
            }
        };
        let children = kind
            .children_key()
            .and_then(|key| fields.remove(key))
            .and_then(|v| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .unwrap_or_default();
        let parent = parent.map(str::to_string);
        let doc = Document {
            doc_id,
            order,
            era_id: if kind == Kind::Topic { parent.clone() } else { None },
            topic_id: if kind == Kind::Event { parent } else { None },
            fields,
        };
        Ok((doc, children))
    }
}

fn children_of<'a>(
    docs: &'a [Document],
    parent: &str,
    link: impl Fn(&Document) -> Option<&String>,
) -> Vec<&'a Document> {
    let mut out: Vec<&Document> = docs.iter().filter(|&d| link(d).map(String::as_str) == Some(parent)).collect();
    out.sort_by_key(|d| d.order);
    out
}

fn has_parent(parent: Option<&str>, parents: &HashSet<&str>) -> bool {
    parent.is_some_and(|p| parents.contains(p))
}

/// Topics whose era is gone, and events that hang off no reachable topic.
fn count_orphans(eras: &[Document], topics: &[Document], events: &[Document]) -> (usize, usize) {
    let era_docs: HashSet<&str> = eras.iter().map(|d| d.doc_id.as_str()).collect();
    let (linked, orphaned): (Vec<&Document>, Vec<&Document>) =
        topics.iter().partition(|t| has_parent(t.era_id.as_deref(), &era_docs));
    let topic_docs: HashSet<&str> = linked.iter().map(|d| d.doc_id.as_str()).collect();
    let orphan_events = events.iter().filter(|e| !has_parent(e.topic_id.as_deref(), &topic_docs)).count();
    (orphaned.len(), orphan_events)
}

fn with_children(doc: &Document, key: &str, children: Vec<Value>) -> Value {
    let mut fields = doc.fields.clone();
    fields.insert(key.to_string(), Value::Array(children));
    Value::Object(fields)
}

#[async_trait]
impl ContentBackend for DocumentBackend {
    #[instrument(level = "debug", skip(self), fields(%lang))]
    async fn load(&self, lang: Language) -> Result<Option<Vec<Era>>, StorageError> {
        let Some(mut eras) = self.read_collection(&Kind::Era.collection(lang)).await? else {
            return Ok(None);
        };
        let topics = self.read_collection(&Kind::Topic.collection(lang)).await?.unwrap_or_default();
        let events = self.read_collection(&Kind::Event.collection(lang)).await?.unwrap_or_default();
        eras.sort_by_key(|d| d.order);

        let (orphan_topics, orphan_events) = count_orphans(&eras, &topics, &events);
        if orphan_topics > 0 || orphan_events > 0 {
            warn!(target: "storage", %lang, orphan_topics, orphan_events, "skipping documents without a parent");
        }

        let mut tree = Vec::with_capacity(eras.len());
        for era in &eras {
            let mut topic_values = Vec::new();
            for topic in children_of(&topics, &era.doc_id, |d| d.era_id.as_ref()) {
                let event_values = children_of(&events, &topic.doc_id, |d| d.topic_id.as_ref())
                    .into_iter()
                    .map(|e| Value::Object(e.fields.clone()))
                    .collect();
                topic_values.push(with_children(topic, "events", event_values));
            }
            tree.push(with_children(era, "topics", topic_values));
        }

        let key = Kind::Era.collection(lang);
        let tree: Vec<Era> = serde_json::from_value(Value::Array(tree))
            .map_err(|source| StorageError::Corrupt { key, source })?;

        // Remember document ids so the next save updates the same documents.
        let mut ids = self.doc_ids.lock().await;
        for (kind, docs) in [(Kind::Era, &eras), (Kind::Topic, &topics), (Kind::Event, &events)] {
            for doc in docs.iter() {
                if let Some(id) = doc.entity_id() {
                    ids.insert((lang, kind, id), doc.doc_id.clone());
                }
            }
        }
        Ok(Some(tree))
    }

    #[instrument(level = "debug", skip(self, eras), fields(%lang, eras = eras.len()))]
    async fn save(&self, lang: Language, eras: &[Era]) -> Result<(), StorageError> {
        let (mut era_docs, mut topic_docs, mut event_docs) = (Vec::new(), Vec::new(), Vec::new());
        {
            let mut ids = self.doc_ids.lock().await;
            let mut doc_id_for = |kind: Kind, id: u64| -> String {
                ids.entry((lang, kind, id)).or_insert_with(|| Uuid::new_v4().to_string()).clone()
            };

            for (era_order, era) in eras.iter().enumerate() {
                let era_doc_id = doc_id_for(Kind::Era, era.id);
                let (doc, topics) =
                    Self::to_document(Kind::Era, serde_json::to_value(era)?, era_order + 1, era_doc_id, None)?;
                for (topic_order, topic) in topics.into_iter().enumerate() {
                    let topic_id = topic.get("id").and_then(Value::as_u64).unwrap_or_default();
                    let topic_doc_id = doc_id_for(Kind::Topic, topic_id);
                    let (tdoc, events) =
                        Self::to_document(Kind::Topic, topic, topic_order + 1, topic_doc_id, Some(&doc.doc_id))?;
                    for (event_order, event) in events.into_iter().enumerate() {
                        let event_id = event.get("id").and_then(Value::as_u64).unwrap_or_default();
                        let event_doc_id = doc_id_for(Kind::Event, event_id);
                        let (edoc, _) =
                            Self::to_document(Kind::Event, event, event_order + 1, event_doc_id, Some(&tdoc.doc_id))?;
                        event_docs.push(edoc);
                    }
                    topic_docs.push(tdoc);
                }
                era_docs.push(doc);
            }
        }

        // Children first: a crash between writes leaves orphans, which load skips.
        self.write_collection(&Kind::Event.collection(lang), &event_docs).await?;
        self.write_collection(&Kind::Topic.collection(lang), &topic_docs).await?;
        self.write_collection(&Kind::Era.collection(lang), &era_docs).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "document"
    }
}
