//! Budget trimming by priority class.
//!
//! Messages are evicted lowest class first; within a class the most recent
//! message goes first, so older grounding context survives longer. Preserved
//! sources are never evicted, even when they alone exceed the budget.

use crate::cost::{ModelCostProfile, estimate_input_cost};
use crate::token::estimate_tokens;
use contextweave_core::message::{Message, MessageSource};
use tracing::debug;

/// Eviction class for a source. Higher survives longer.
pub fn source_priority(source: MessageSource) -> u8 {
    match source {
        MessageSource::SystemPrompt => 8,
        MessageSource::Important => 7,
        MessageSource::UserInput => 6,
        MessageSource::Proactive => 5,
        MessageSource::AssistantReply => 4,
        MessageSource::ToolResult => 3,
        MessageSource::UserHistory => 2,
        MessageSource::Debug | MessageSource::Evaluation => 1,
        MessageSource::Unknown => 0,
    }
}

/// Trimming limits.
#[derive(Debug, Clone, Default)]
pub struct TrimConfig {
    pub max_tokens: usize,
    /// Cost ceiling in USD. Only enforced when positive and `model` is set.
    pub max_cost_usd: f64,
    pub preserved_sources: Vec<MessageSource>,
    pub model: Option<ModelCostProfile>,
}

/// Outcome of [`trim_messages`].
#[derive(Debug, Clone, Default)]
pub struct TrimResult {
    /// Survivors, in original order.
    pub kept: Vec<Message>,
    /// Evicted messages, in eviction order.
    pub trimmed: Vec<Message>,
    pub total_tokens: usize,
    pub estimated_cost_usd: f64,
}

struct TrimEntry {
    tokens: usize,
    preserved: bool,
    priority: u8,
}

/// Drop the lowest-priority messages until the token (and cost) ceiling holds.
pub fn trim_messages(messages: &[Message], config: &TrimConfig) -> TrimResult {
    if messages.is_empty() {
        return TrimResult::default();
    }

    let entries: Vec<TrimEntry> = messages
        .iter()
        .map(|m| TrimEntry {
            tokens: estimate_tokens(&m.content),
            preserved: config.preserved_sources.contains(&m.source),
            priority: source_priority(m.source),
        })
        .collect();

    let cost_model = config.model.as_ref().filter(|_| config.max_cost_usd > 0.0);
    let within = |tokens: usize| {
        tokens <= config.max_tokens
            && cost_model
                .is_none_or(|model| estimate_input_cost(tokens, Some(model)) <= config.max_cost_usd)
    };

    let mut total: usize = entries.iter().map(|e| e.tokens).sum();
    if within(total) {
        return TrimResult {
            kept: messages.to_vec(),
            trimmed: Vec::new(),
            total_tokens: total,
            estimated_cost_usd: estimate_input_cost(total, config.model.as_ref()),
        };
    }

    // Ascending priority; within a class the later message comes first.
    let mut candidates: Vec<usize> = (0..messages.len())
        .filter(|&i| !entries[i].preserved)
        .collect();
    candidates.sort_by(|&a, &b| {
        entries[a]
            .priority
            .cmp(&entries[b].priority)
            .then_with(|| b.cmp(&a))
    });

    let mut evicted = vec![false; messages.len()];
    let mut trimmed = Vec::new();
    for idx in candidates {
        if within(total) {
            break;
        }
        evicted[idx] = true;
        total -= entries[idx].tokens;
        trimmed.push(messages[idx].clone());
    }

    let kept: Vec<Message> = messages
        .iter()
        .zip(&evicted)
        .filter(|(_, gone)| !**gone)
        .map(|(m, _)| m.clone())
        .collect();

    debug!(
        kept = kept.len(),
        trimmed = trimmed.len(),
        total_tokens = total,
        max_tokens = config.max_tokens,
        "Trimmed messages to budget"
    );

    TrimResult {
        kept,
        trimmed,
        total_tokens: total,
        estimated_cost_usd: estimate_input_cost(total, config.model.as_ref()),
    }
}
