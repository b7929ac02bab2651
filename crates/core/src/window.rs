//! Context window types and the prompt-rendering seam.
//!
//! A [`ContextWindow`] has three sections:
//!
//! 1. **Static** (persona, goal, policies, knowledge, world) from the registry snapshot
//! 2. **Dynamic** (plans, beliefs, world state) from the session state store
//! 3. **Meta** (persona version, memory fragments, recommendations) derived from history
//!
//! Rendering those sections into system-prompt text is the job of a
//! [`PromptComposer`].

use crate::message::{Message, Metadata};
use crate::profile::{GoalProfile, KnowledgeReference, PersonaProfile, PolicyRule, WorldProfile};
use crate::session::{Belief, FeedbackSignal, PlanNode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Window sections ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticContext {
    pub persona: PersonaProfile,
    pub goal: GoalProfile,
    /// Sorted by policy id.
    pub policies: Vec<PolicyRule>,
    /// Sorted by knowledge id.
    pub knowledge: Vec<KnowledgeReference>,
    /// Tool hints such as `mode=web`.
    pub tools: Vec<String>,
    pub world: WorldProfile,
    /// Cleared in web tool mode.
    pub environment_summary: String,
    /// Fingerprint of the registry snapshot this section came from.
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicContext {
    pub turn_id: u64,
    pub llm_turn_seq: u64,
    pub plans: Vec<PlanNode>,
    pub beliefs: Vec<Belief>,
    pub world_state: Metadata,
    pub feedback: Vec<FeedbackSignal>,
    pub snapshot_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryFragment {
    pub key: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaContext {
    pub persona_version: String,
    pub memories: Vec<MemoryFragment>,
    pub recommendations: Vec<String>,
}

/// The assembled window handed to the LLM call site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextWindow {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub system_prompt: String,
    #[serde(rename = "static")]
    pub static_context: StaticContext,
    pub dynamic: DynamicContext,
    pub meta: MetaContext,
}

/// Per-request window options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextWindowConfig {
    /// Auto-compaction limit. Zero disables compaction.
    pub token_limit: usize,
    pub persona_key: String,
    pub goal_key: String,
    pub world_key: String,
    /// `cli`, `web`, ...
    pub tool_mode: String,
    pub tool_preset: String,
    pub environment_summary: String,
}

// ── Rendering seam ────────────────────────────────────────────────────────

/// Everything a composer needs to render the system prompt.
pub struct PromptInput<'a> {
    pub static_context: &'a StaticContext,
    pub dynamic: &'a DynamicContext,
    pub meta: &'a MetaContext,
    /// True when the environment section must be left out (web mode).
    pub omit_environment: bool,
}

/// Renders window sections into system-prompt text.
pub trait PromptComposer: Send + Sync {
    fn compose(&self, input: &PromptInput<'_>) -> String;
}
