//! Session state and the state-store collaborator.
//!
//! The engine does not persist conversation state itself. It reads the
//! latest [`StateSnapshot`] through a [`StateStore`] when building a window,
//! and writes one when a turn is recorded.

use crate::error::StoreError;
use crate::message::{Message, Metadata};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A conversation session as seen by the window manager.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    pub id: String,

    #[serde(default)]
    pub messages: Vec<Message>,

    /// Free-form session metadata (`persona`, `world`, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Trimmed, non-empty metadata value.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// One node of a (possibly nested) plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanNode {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PlanNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Belief {
    pub statement: String,
    pub confidence: f64,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackSignal {
    pub kind: String,
    pub message: String,
    pub value: f64,
}

/// Persisted per-turn state for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub session_id: String,
    pub turn_id: u64,
    pub llm_turn_seq: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub plans: Vec<PlanNode>,
    #[serde(default)]
    pub beliefs: Vec<Belief>,
    #[serde(default)]
    pub world: Metadata,
    #[serde(default)]
    pub diff: Metadata,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub feedback: Vec<FeedbackSignal>,
    #[serde(default)]
    pub knowledge_refs: Vec<String>,
}

/// A completed turn, as reported by the agent loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnRecord {
    pub session_id: String,
    pub turn_id: u64,
    pub llm_turn_seq: u64,
    /// When the turn finished. `None` means "now" at record time.
    pub timestamp: Option<DateTime<Utc>>,
    pub summary: String,
    pub plans: Vec<PlanNode>,
    pub beliefs: Vec<Belief>,
    pub world: Metadata,
    pub diff: Metadata,
    pub messages: Vec<Message>,
    pub feedback: Vec<FeedbackSignal>,
    pub knowledge_refs: Vec<String>,
}

impl TurnRecord {
    /// Convert into a snapshot, stamping `now` when no timestamp was set.
    pub fn to_snapshot(&self, now: DateTime<Utc>) -> StateSnapshot {
        StateSnapshot {
            session_id: self.session_id.clone(),
            turn_id: self.turn_id,
            llm_turn_seq: self.llm_turn_seq,
            created_at: self.timestamp.unwrap_or(now),
            summary: self.summary.clone(),
            plans: self.plans.clone(),
            beliefs: self.beliefs.clone(),
            world: self.world.clone(),
            diff: self.diff.clone(),
            messages: self.messages.clone(),
            feedback: self.feedback.clone(),
            knowledge_refs: self.knowledge_refs.clone(),
        }
    }
}

/// Storage for per-session state snapshots.
///
/// Implementations: in-memory (window crate), or anything the host
/// application provides.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// The most recent snapshot for a session, or `None` if none exists.
    async fn latest_snapshot(&self, session_id: &str) -> Result<Option<StateSnapshot>, StoreError>;

    /// Persist a snapshot.
    async fn save_snapshot(&self, snapshot: StateSnapshot) -> Result<(), StoreError>;
}
