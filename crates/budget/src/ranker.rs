//! Message priority ranking.
//!
//! Each message gets a score in `[0.0, 1.0]`:
//!
//! ```text
//! priority = clamp(base(source) + recency(i, n) + content_signal, 0.0, 1.0)
//! ```
//!
//! - **base**: per-source weight from [`SourceWeights`]
//! - **recency**: `0.15 * i / (n - 1)`, zero for a single message
//! - **content signal**: `+0.05` for tool calls/results, `+0.10` for error keywords
//!
//! Scoring is additive with no inter-message dependency, so ranking the same
//! input twice yields identical scores.

use contextweave_core::message::{Message, MessageSource};
use std::collections::BTreeMap;

/// Recency bonus given to the last message of a conversation.
pub const MAX_RECENCY_BONUS: f64 = 0.15;

/// Bonus for messages carrying tool calls or tool results.
pub const TOOL_ACTIVITY_BONUS: f64 = 0.05;

/// Bonus for messages whose content mentions an error.
pub const ERROR_KEYWORD_BONUS: f64 = 0.10;

/// Weight for sources missing from the weight table.
pub const UNKNOWN_SOURCE_WEIGHT: f64 = 0.40;

const ERROR_KEYWORDS: [&str; 5] = ["error", "fail", "exception", "panic", "fatal"];

/// Source → base weight mapping.
pub type SourceWeights = BTreeMap<MessageSource, f64>;

/// The built-in weight table.
pub fn default_source_weights() -> SourceWeights {
    BTreeMap::from([
        (MessageSource::SystemPrompt, 0.85),
        (MessageSource::Important, 0.80),
        (MessageSource::UserInput, 0.70),
        (MessageSource::Proactive, 0.60),
        (MessageSource::AssistantReply, 0.55),
        (MessageSource::ToolResult, 0.50),
        (MessageSource::UserHistory, 0.45),
        (MessageSource::Evaluation, 0.25),
        (MessageSource::Debug, 0.20),
        (MessageSource::Unknown, UNKNOWN_SOURCE_WEIGHT),
    ])
}

/// A message paired with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedMessage {
    pub message: Message,
    /// Score in `[0.0, 1.0]`.
    pub priority: f64,
    /// How the score was derived, e.g. `base=user_input+recency+content_signal`.
    pub reason: String,
    /// Chronological position in the ranked input.
    pub index: usize,
}

/// Scores messages by source, recency and content.
#[derive(Debug, Clone)]
pub struct MessageRanker {
    weights: SourceWeights,
}

impl Default for MessageRanker {
    fn default() -> Self {
        Self::new(SourceWeights::new())
    }
}

impl MessageRanker {
    /// Create a ranker. `overrides` replace individual default weights;
    /// sources not mentioned keep their default.
    pub fn new(overrides: SourceWeights) -> Self {
        let mut weights = default_source_weights();
        weights.extend(overrides);
        Self { weights }
    }

    /// Base weight for a source.
    pub fn base_weight(&self, source: MessageSource) -> f64 {
        self.weights
            .get(&source)
            .copied()
            .unwrap_or(UNKNOWN_SOURCE_WEIGHT)
    }

    /// Rank messages, returning one entry per input in chronological order.
    pub fn rank_messages(&self, messages: &[Message]) -> Vec<RankedMessage> {
        let n = messages.len();
        messages
            .iter()
            .enumerate()
            .map(|(i, msg)| {
                let base = self.base_weight(msg.source);
                let recency = recency_bonus(i, n);
                let signal = content_bonus(msg);

                let mut reason = format!("base={}", msg.source);
                if recency > 0.0 {
                    reason.push_str("+recency");
                }
                if signal > 0.0 {
                    reason.push_str("+content_signal");
                }

                RankedMessage {
                    message: msg.clone(),
                    priority: (base + recency + signal).clamp(0.0, 1.0),
                    reason,
                    index: i,
                }
            })
            .collect()
    }
}

fn recency_bonus(i: usize, n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    MAX_RECENCY_BONUS * i as f64 / (n - 1) as f64
}

fn content_bonus(msg: &Message) -> f64 {
    let mut bonus = 0.0;
    if msg.has_tool_activity() {
        bonus += TOOL_ACTIVITY_BONUS;
    }
    let lowered = msg.content.to_lowercase();
    if ERROR_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        bonus += ERROR_KEYWORD_BONUS;
    }
    bonus
}

/// Pick the highest-priority messages that fit in `token_budget`.
///
/// Candidates are visited by descending priority (ties keep chronological
/// order). A candidate that does not fit is skipped and the walk continues.
/// The selection is returned in chronological order. Empty input or a zero
/// budget selects nothing.
pub fn select_top_n<F>(
    ranked: &[RankedMessage],
    token_budget: usize,
    token_cost: F,
) -> Vec<RankedMessage>
where
    F: Fn(&Message) -> usize,
{
    if ranked.is_empty() || token_budget == 0 {
        return Vec::new();
    }

    let mut by_priority: Vec<&RankedMessage> = ranked.iter().collect();
    // Stable: equal priorities keep their input order.
    by_priority.sort_by(|a, b| b.priority.total_cmp(&a.priority));

    let mut used = 0usize;
    let mut selected: Vec<RankedMessage> = Vec::new();
    for candidate in by_priority {
        let cost = token_cost(&candidate.message);
        if used + cost <= token_budget {
            used += cost;
            selected.push(candidate.clone());
        }
    }

    selected.sort_by_key(|rm| rm.index);
    selected
}
