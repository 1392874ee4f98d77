//! Queue entries and the priority-ordered pending list.

use serde::Serialize;

use crate::model::{ContentType, Profile, Project};

/// What a queue entry re-embeds.
#[derive(Debug, Clone, PartialEq)]
pub enum QueuePayload {
    Profile(Profile),
    Project(Project),
}

impl QueuePayload {
    pub fn content_type(&self) -> ContentType {
        match self {
            QueuePayload::Profile(_) => ContentType::Profile,
            QueuePayload::Project(_) => ContentType::Project,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            QueuePayload::Profile(p) => &p.id,
            QueuePayload::Project(p) => &p.id,
        }
    }

    /// Profile that owns the resulting document.
    pub fn owner_id(&self) -> &str {
        match self {
            QueuePayload::Profile(p) => &p.id,
            QueuePayload::Project(p) => &p.profile_id,
        }
    }
}

/// One pending re-embedding job.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub payload: QueuePayload,
    pub priority: f64,
    pub retries: u32,
    seq: u64,
}

impl QueueItem {
    pub fn content_type(&self) -> ContentType {
        self.payload.content_type()
    }

    pub fn id(&self) -> &str {
        self.payload.id()
    }
}

/// Lightweight view of a pending item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingSummary {
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub id: String,
    pub priority: f64,
    pub retries: u32,
}

/// Pending items, highest priority first, FIFO among equal priorities.
#[derive(Debug, Default)]
pub(crate) struct PendingList {
    items: Vec<QueueItem>,
    next_seq: u64,
}

impl PendingList {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add a fresh item.
    pub fn push(&mut self, payload: QueuePayload, priority: f64) {
        let item = QueueItem {
            payload,
            priority,
            retries: 0,
            seq: 0,
        };
        self.insert(item);
    }

    /// Put an item back, behind everything already queued at its priority.
    pub fn insert(&mut self, mut item: QueueItem) {
        item.seq = self.next_seq;
        self.next_seq += 1;
        let at = self.items.partition_point(|x| x.priority >= item.priority);
        self.items.insert(at, item);
    }

    pub fn pop(&mut self) -> Option<QueueItem> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.remove(0))
        }
    }

    /// Drop every item matching `predicate`; returns how many were removed.
    pub fn remove_where(&mut self, predicate: impl Fn(&QueueItem) -> bool) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !predicate(item));
        before - self.items.len()
    }

    pub fn summaries(&self) -> Vec<PendingSummary> {
        self.items
            .iter()
            .map(|item| PendingSummary {
                content_type: item.content_type(),
                id: item.id().to_string(),
                priority: item.priority,
                retries: item.retries,
            })
            .collect()
    }
}
