//! Message domain types.
//!
//! A [`Message`] is one conversational unit flowing through the budget engine.
//! Besides the usual role and text, every message carries a provenance tag
//! ([`MessageSource`]) that drives both ranking and eviction order.
//!
//! The engine never mutates caller-owned messages; it only selects and
//! recombines them into new sequences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions
    System,
    /// Tool execution result
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a message exists in the conversation.
///
/// Drives both rendering and eviction priority. Unrecognised tags
/// deserialize to [`MessageSource::Unknown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSource {
    SystemPrompt,
    Important,
    UserInput,
    Proactive,
    AssistantReply,
    ToolResult,
    UserHistory,
    Evaluation,
    Debug,
    #[default]
    #[serde(other)]
    Unknown,
}

impl MessageSource {
    /// All sources, in declaration order.
    pub const ALL: [MessageSource; 10] = [
        Self::SystemPrompt,
        Self::Important,
        Self::UserInput,
        Self::Proactive,
        Self::AssistantReply,
        Self::ToolResult,
        Self::UserHistory,
        Self::Evaluation,
        Self::Debug,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SystemPrompt => "system_prompt",
            Self::Important => "important",
            Self::UserInput => "user_input",
            Self::Proactive => "proactive",
            Self::AssistantReply => "assistant_reply",
            Self::ToolResult => "tool_result",
            Self::UserHistory => "user_history",
            Self::Evaluation => "evaluation",
            Self::Debug => "debug",
            Self::Unknown => "unknown",
        }
    }

    /// Sources that compaction never folds into a summary.
    pub fn is_always_kept(&self) -> bool {
        matches!(self, Self::SystemPrompt | Self::Important)
    }
}

impl std::fmt::Display for MessageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A schema-less scalar used in message metadata and world-state maps.
///
/// Replaces an open `any` map: extraction code matches on the variant
/// instead of downcasting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetaValue {
    /// The value as a string slice, if it is textual.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl std::fmt::Display for MetaValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Ordered key → scalar map. Ordered so serialization is deterministic.
pub type Metadata = BTreeMap<String, MetaValue>;

/// Metadata keys that may carry the originating tool's name, in lookup order.
const TOOL_NAME_KEYS: [&str; 3] = ["tool_name", "tool", "name"];

/// Find the tool name recorded in a message's metadata, if any.
///
/// Only non-empty textual values count.
pub fn extract_tool_name_from_metadata(metadata: &Metadata) -> Option<&str> {
    TOOL_NAME_KEYS.iter().find_map(|key| {
        metadata
            .get(*key)
            .and_then(MetaValue::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
    })
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as JSON string
    #[serde(default)]
    pub arguments: String,
}

/// A tool result attached to a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultRecord {
    /// The tool call this result answers
    pub call_id: String,

    /// Result payload
    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub is_error: bool,
}

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    #[serde(default = "new_message_id")]
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// Provenance tag
    #[serde(default)]
    pub source: MessageSource,

    /// The text content
    #[serde(default)]
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// Tool results carried by this message (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResultRecord>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Optional metadata (tool info, channel info, etc.)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl Message {
    /// Create a message with an explicit role, source and content.
    pub fn new(role: Role, source: MessageSource, content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role,
            source,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
            metadata: Metadata::new(),
        }
    }

    /// Create a new user message (source: user input).
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, MessageSource::UserInput, content)
    }

    /// Create a new assistant message (source: assistant reply).
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, MessageSource::AssistantReply, content)
    }

    /// Create a new system message (source: system prompt).
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, MessageSource::SystemPrompt, content)
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(Role::Tool, MessageSource::ToolResult, content)
        }
    }

    /// Replace the provenance tag.
    pub fn with_source(mut self, source: MessageSource) -> Self {
        self.source = source;
        self
    }

    /// Attach tool calls.
    pub fn with_tool_calls(mut self, calls: Vec<MessageToolCall>) -> Self {
        self.tool_calls = calls;
        self
    }

    /// Attach tool results.
    pub fn with_tool_results(mut self, results: Vec<ToolResultRecord>) -> Self {
        self.tool_results = results;
        self
    }

    /// Insert one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Whether this message carries tool call or tool result sub-records.
    pub fn has_tool_activity(&self) -> bool {
        !self.tool_calls.is_empty() || !self.tool_results.is_empty()
    }

    /// Tool name from metadata, falling back to the first tool call's name.
    pub fn tool_name(&self) -> Option<&str> {
        extract_tool_name_from_metadata(&self.metadata)
            .or_else(|| self.tool_calls.first().map(|c| c.name.as_str()))
    }
}
