//! Compression and auto-compaction.
//!
//! When a conversation grows past `limit * threshold` tokens, the
//! compressible middle (everything not sourced as system prompt or
//! important) is folded into one synthetic system message: a deterministic
//! digest of message counts plus short snippets. No model call is involved.
//!
//! An optional [`FlushHook`] sees the about-to-be-folded messages first, so
//! a host can persist them before they disappear from the window.

use crate::token::{HeuristicTokenCounter, TokenCounter};
use contextweave_core::error::CompressionError;
use contextweave_core::hook::FlushHook;
use contextweave_core::message::{Message, MessageSource, Role};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default fraction of the limit that triggers compaction.
pub const DEFAULT_COMPRESSION_THRESHOLD: f64 = 0.8;

/// Turns kept by [`CompactionEngine::aggressive_trim`] when none are given.
pub const DEFAULT_AGGRESSIVE_MAX_TURNS: usize = 6;

/// Longest snippet quoted in a summary, in characters.
pub const SUMMARY_SNIPPET_CHARS: usize = 140;

// ── Budget classification ─────────────────────────────────────────────────

/// What a caller should do about the current token count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetAction {
    Ok,
    Compress,
    AggressiveTrim,
}

impl std::fmt::Display for BudgetAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Ok => "ok",
            Self::Compress => "compress",
            Self::AggressiveTrim => "aggressive_trim",
        })
    }
}

/// Classify `token_count / limit` against two thresholds. A ratio equal to
/// a threshold falls into the stricter tier. A zero limit is always `Ok`.
pub fn budget_check(
    token_count: usize,
    limit: usize,
    compression_threshold: f64,
    aggressive_threshold: f64,
) -> BudgetAction {
    if limit == 0 {
        return BudgetAction::Ok;
    }
    let ratio = token_count as f64 / limit as f64;
    if ratio >= aggressive_threshold {
        BudgetAction::AggressiveTrim
    } else if ratio >= compression_threshold {
        BudgetAction::Compress
    } else {
        BudgetAction::Ok
    }
}

// ── Summary digest ────────────────────────────────────────────────────────

/// Collapse whitespace and cut to `max_chars` characters, marking the cut
/// with `...`.
pub fn build_compression_snippet(content: &str, max_chars: usize) -> String {
    let normalized = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if max_chars == 0 || normalized.chars().count() <= max_chars {
        return normalized;
    }
    let cut: String = normalized.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

/// Deterministic digest of a message run, or `None` for an empty run.
pub fn build_summary(messages: &[Message]) -> Option<String> {
    if messages.is_empty() {
        return None;
    }

    let mut user = Vec::new();
    let mut assistant = Vec::new();
    let mut tool_refs = 0usize;
    for msg in messages {
        match msg.role {
            Role::User => user.push(msg),
            Role::Assistant => assistant.push(msg),
            Role::Tool => tool_refs += 1,
            Role::System => {}
        }
        tool_refs += msg.tool_calls.len();
    }

    let mut sentences = vec![format!(
        "Earlier conversation had {} user message(s) and {} assistant response(s)",
        user.len(),
        assistant.len()
    )];
    if tool_refs > 0 {
        sentences.push(format!("{tool_refs} tool reference(s) were made"));
    }
    push_snippets(&mut sentences, &user, "User first asked", "Most recent user message");
    push_snippets(
        &mut sentences,
        &assistant,
        "Assistant first replied",
        "Most recent assistant reply",
    );

    Some(format!("{}.", sentences.join(". ")))
}

fn push_snippets(out: &mut Vec<String>, msgs: &[&Message], first_label: &str, last_label: &str) {
    let snippets: Vec<String> = msgs
        .iter()
        .map(|m| build_compression_snippet(&m.content, SUMMARY_SNIPPET_CHARS))
        .filter(|s| !s.is_empty())
        .collect();
    let (Some(first), Some(last)) = (snippets.first(), snippets.last()) else {
        return;
    };
    out.push(format!("{first_label}: \"{first}\""));
    if last != first {
        out.push(format!("{last_label}: \"{last}\""));
    }
}

fn summary_message(content: String) -> Message {
    Message::new(Role::System, MessageSource::SystemPrompt, content)
}

// ── Engine ────────────────────────────────────────────────────────────────

/// Compresses conversations against a token limit.
#[derive(Clone)]
pub struct CompactionEngine {
    threshold: f64,
    flush_hook: Option<Arc<dyn FlushHook>>,
    counter: Arc<dyn TokenCounter>,
}

impl Default for CompactionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CompactionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompactionEngine")
            .field("threshold", &self.threshold)
            .field("flush_hook", &self.flush_hook.is_some())
            .finish()
    }
}

impl CompactionEngine {
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_COMPRESSION_THRESHOLD,
            flush_hook: None,
            counter: Arc::new(HeuristicTokenCounter),
        }
    }

    /// Set the compaction threshold. Non-positive values fall back to the
    /// default.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = if threshold > 0.0 {
            threshold
        } else {
            DEFAULT_COMPRESSION_THRESHOLD
        };
        self
    }

    pub fn with_flush_hook(mut self, hook: Arc<dyn FlushHook>) -> Self {
        self.flush_hook = Some(hook);
        self
    }

    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn estimate_tokens(&self, messages: &[Message]) -> usize {
        self.counter.count_messages(messages)
    }

    /// True when the estimate exceeds `limit * threshold`.
    pub fn should_compress(&self, messages: &[Message], limit: usize) -> bool {
        self.estimate_tokens(messages) as f64 > limit as f64 * self.threshold
    }

    /// Fold compressible messages into one summary so the result targets
    /// `target_tokens`.
    ///
    /// The summary takes the place of the first compressible message;
    /// always-kept messages keep their relative order around it.
    pub fn compress(
        &self,
        messages: &[Message],
        target_tokens: usize,
    ) -> Result<Vec<Message>, CompressionError> {
        if target_tokens == 0 {
            return Err(CompressionError::InvalidTarget {
                target: target_tokens,
            });
        }
        if self.estimate_tokens(messages) <= target_tokens {
            return Ok(messages.to_vec());
        }

        let compressible: Vec<Message> = messages
            .iter()
            .filter(|m| !m.source.is_always_kept())
            .cloned()
            .collect();
        let Some(summary) = build_summary(&compressible) else {
            return Ok(messages.to_vec());
        };

        let mut summary = Some(summary_message(summary));
        let mut out = Vec::with_capacity(messages.len() - compressible.len() + 1);
        for msg in messages {
            if msg.source.is_always_kept() {
                out.push(msg.clone());
            } else if let Some(s) = summary.take() {
                out.push(s);
            }
        }

        debug!(
            before = messages.len(),
            after = out.len(),
            folded = compressible.len(),
            "Compressed conversation"
        );
        Ok(out)
    }

    /// Compress when over threshold. Returns the (possibly unchanged)
    /// messages and whether compaction happened.
    pub fn auto_compact(&self, messages: &[Message], limit: usize) -> (Vec<Message>, bool) {
        if !self.should_compress(messages, limit) {
            return (messages.to_vec(), false);
        }

        if let Some(hook) = &self.flush_hook {
            let doomed: Vec<Message> = messages
                .iter()
                .filter(|m| !m.source.is_always_kept())
                .cloned()
                .collect();
            if let Err(e) = hook.flush(&doomed) {
                warn!(error = %e, "Flush hook failed before compaction; continuing");
            }
        }

        let target = (limit as f64 * self.threshold) as usize;
        match self.compress(messages, target) {
            Ok(compacted) => (compacted, true),
            Err(e) => {
                warn!(error = %e, "Auto-compaction failed; keeping original messages");
                (messages.to_vec(), false)
            }
        }
    }

    /// Keep only the last `max_turns` user-initiated turns of the
    /// conversational messages, summarizing the rest.
    ///
    /// Output order: always-kept messages, then the summary, then the kept
    /// turns. Without any user message nothing is trimmed.
    pub fn aggressive_trim(&self, messages: &[Message], max_turns: usize) -> Vec<Message> {
        let max_turns = if max_turns == 0 {
            DEFAULT_AGGRESSIVE_MAX_TURNS
        } else {
            max_turns
        };

        let (preserved, conversational): (Vec<Message>, Vec<Message>) = messages
            .iter()
            .cloned()
            .partition(|m| m.source.is_always_kept());

        let turn_starts: Vec<usize> = conversational
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role == Role::User)
            .map(|(i, _)| i)
            .collect();
        if turn_starts.len() <= max_turns {
            return messages.to_vec();
        }

        let cut = turn_starts[turn_starts.len() - max_turns];
        let (dropped, kept) = conversational.split_at(cut);

        let mut out = preserved;
        if let Some(summary) = build_summary(dropped) {
            out.push(summary_message(summary));
        }
        out.extend_from_slice(kept);

        debug!(
            dropped = dropped.len(),
            kept_turns = max_turns,
            "Aggressively trimmed conversation"
        );
        out
    }
}
