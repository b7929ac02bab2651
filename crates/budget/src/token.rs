//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 bytes per token, rounded up.
//! Accurate within ~10% for BPE tokenizers on English text, and fully
//! deterministic, which is what the budgeting code needs.

use contextweave_core::message::Message;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 bytes. Rounds up. Empty text is 0.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Estimate tokens for a single message. Only content counts, so a message
/// with empty content contributes nothing.
pub fn estimate_message_tokens(message: &Message) -> usize {
    estimate_tokens(&message.content)
}

/// Estimate tokens for a slice of messages. Additive over messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

/// Pluggable token counting, for callers that own a real tokenizer.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;

    fn count_messages(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.count(&m.content)).sum()
    }
}

/// The default [`TokenCounter`], backed by [`estimate_tokens`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenCounter;

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, text: &str) -> usize {
        estimate_tokens(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn hundred_chars() {
        let text = "a".repeat(100);
        assert_eq!(estimate_tokens(&text), 25);
    }

    #[test]
    fn empty_message_contributes_nothing() {
        let msgs = vec![Message::user("hello"), Message::assistant("")];
        assert_eq!(estimate_messages_tokens(&msgs), 2);
    }

    #[test]
    fn adding_a_message_never_decreases_total() {
        let mut msgs = vec![Message::user("hello"), Message::assistant("world")];
        let before = estimate_messages_tokens(&msgs);
        msgs.push(Message::system(""));
        assert_eq!(estimate_messages_tokens(&msgs), before);
        msgs.push(Message::system("more"));
        assert!(estimate_messages_tokens(&msgs) > before);
    }

    #[test]
    fn heuristic_counter_matches_free_functions() {
        let msgs = vec![Message::user("hello"), Message::assistant("world!")];
        assert_eq!(
            HeuristicTokenCounter.count_messages(&msgs),
            estimate_messages_tokens(&msgs)
        );
    }
}
