//! Turn journal collaborator.
//!
//! Every recorded turn is forwarded to a [`JournalWriter`] for replay and
//! audit. Write failures are the writer's concern; the window manager logs
//! them and moves on.

use crate::error::JournalError;
use crate::message::{Message, Metadata};
use crate::session::{Belief, FeedbackSignal, PlanNode, TurnRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One journal line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnJournalEntry {
    pub session_id: String,
    pub turn_id: u64,
    pub llm_turn_seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plans: Vec<PlanNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub beliefs: Vec<Belief>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub world: Metadata,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub diff: Metadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feedback: Vec<FeedbackSignal>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub knowledge_refs: Vec<String>,
}

impl TurnJournalEntry {
    /// Build an entry from a turn record, stamping `now` when unset.
    pub fn from_record(record: &TurnRecord, now: DateTime<Utc>) -> Self {
        Self {
            session_id: record.session_id.clone(),
            turn_id: record.turn_id,
            llm_turn_seq: record.llm_turn_seq,
            timestamp: record.timestamp.unwrap_or(now),
            summary: record.summary.clone(),
            plans: record.plans.clone(),
            beliefs: record.beliefs.clone(),
            world: record.world.clone(),
            diff: record.diff.clone(),
            messages: record.messages.clone(),
            feedback: record.feedback.clone(),
            knowledge_refs: record.knowledge_refs.clone(),
        }
    }
}

/// Append-only sink for turn journal entries.
#[async_trait]
pub trait JournalWriter: Send + Sync {
    async fn write(&self, entry: TurnJournalEntry) -> Result<(), JournalError>;
}
