//! Meta guidance derived from recent message history.

use chrono::{DateTime, Utc};
use contextweave_budget::compaction::build_compression_snippet;
use contextweave_core::{MemoryFragment, Message, MessageSource, MetaContext, Role};

/// How many trailing messages the timeline fragment covers.
pub const HISTORY_TIMELINE_LIMIT: usize = 8;

const TIMELINE_SNIPPET_CHARS: usize = 160;
const RECOMMENDATION_SNIPPET_CHARS: usize = 200;
const SYSTEM_SNIPPET_CHARS: usize = 320;
const HISTORY_SOURCE: &str = "session_history";

/// Build the meta section: persona version, a recent-session timeline, the
/// first system prompt, and recommendations naming the latest user request,
/// assistant reply and tool output.
pub fn derive_history_meta(
    messages: &[Message],
    persona_version: &str,
    now: DateTime<Utc>,
) -> MetaContext {
    let mut meta = MetaContext {
        persona_version: persona_version.to_string(),
        ..MetaContext::default()
    };
    if messages.is_empty() {
        return meta;
    }

    let mut first_system = None;
    let mut last_user = None;
    let mut last_assistant = None;
    let mut last_tool = None;

    for msg in messages {
        if first_system.is_none()
            && (msg.source == MessageSource::SystemPrompt || msg.role == Role::System)
        {
            first_system = Some(build_compression_snippet(&msg.content, SYSTEM_SNIPPET_CHARS))
                .filter(|s| !s.is_empty());
        }
        let slot = match msg.role {
            Role::User => &mut last_user,
            Role::Assistant => &mut last_assistant,
            Role::Tool => &mut last_tool,
            Role::System => continue,
        };
        let snippet = build_compression_snippet(&msg.content, RECOMMENDATION_SNIPPET_CHARS);
        if !snippet.is_empty() {
            *slot = Some(snippet);
        }
    }

    let timeline = build_history_timeline(messages, HISTORY_TIMELINE_LIMIT);
    if !timeline.is_empty() {
        meta.memories.push(MemoryFragment {
            key: "recent_session_timeline".into(),
            content: timeline.join("\n"),
            created_at: now,
            source: HISTORY_SOURCE.into(),
        });
    }
    if let Some(content) = first_system {
        meta.memories.push(MemoryFragment {
            key: "session_system_prompt".into(),
            content,
            created_at: now,
            source: HISTORY_SOURCE.into(),
        });
    }

    if let Some(user) = last_user {
        meta.recommendations.push(format!("Latest user request: {user}"));
    }
    if let Some(assistant) = last_assistant {
        meta.recommendations
            .push(format!("Previous assistant response: {assistant}"));
    }
    if let Some(tool) = last_tool {
        meta.recommendations.push(format!("Latest tool insight: {tool}"));
    }
    meta
}

/// `NN. label: snippet` lines for the last `limit` messages.
pub fn build_history_timeline(messages: &[Message], limit: usize) -> Vec<String> {
    if limit == 0 {
        return Vec::new();
    }
    let start = messages.len().saturating_sub(limit);
    messages[start..]
        .iter()
        .enumerate()
        .map(|(i, msg)| {
            let mut snippet = build_compression_snippet(&msg.content, TIMELINE_SNIPPET_CHARS);
            if snippet.is_empty() {
                snippet = "(no visible content)".into();
            }
            format!("{:02}. {}: {}", i + 1, history_label(msg), snippet)
        })
        .collect()
}

fn history_label(msg: &Message) -> String {
    match msg.source {
        MessageSource::SystemPrompt => "system".into(),
        MessageSource::UserInput => "user".into(),
        MessageSource::AssistantReply => "assistant".into(),
        MessageSource::ToolResult => {
            let id = msg
                .tool_call_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty());
            match id.or_else(|| msg.tool_name()) {
                Some(label) => format!("tool[{label}]"),
                None => "tool".into(),
            }
        }
        _ => msg.role.as_str().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn empty_history_only_carries_persona() {
        let meta = derive_history_meta(&[], "ops", now());
        assert_eq!(meta.persona_version, "ops");
        assert!(meta.memories.is_empty());
        assert!(meta.recommendations.is_empty());
    }

    #[test]
    fn timeline_covers_last_eight_messages() {
        let messages: Vec<Message> = (0..10)
            .map(|i| Message::user(format!("question {i}")))
            .collect();
        let timeline = build_history_timeline(&messages, HISTORY_TIMELINE_LIMIT);
        assert_eq!(timeline.len(), 8);
        assert_eq!(timeline[0], "01. user: question 2");
        assert_eq!(timeline[7], "08. user: question 9");
    }

    #[test]
    fn timeline_labels_tools_and_blank_content() {
        let messages = vec![
            Message::system("Be precise."),
            Message::tool_result("call_7", "exit 0"),
            Message::tool_result("", "listing").with_metadata("tool_name", "ls"),
            Message::tool_result("", "   "),
            Message::assistant("done").with_source(MessageSource::Debug),
        ];
        let timeline = build_history_timeline(&messages, HISTORY_TIMELINE_LIMIT);
        assert_eq!(timeline[0], "01. system: Be precise.");
        assert_eq!(timeline[1], "02. tool[call_7]: exit 0");
        assert_eq!(timeline[2], "03. tool[ls]: listing");
        assert_eq!(timeline[3], "04. tool: (no visible content)");
        assert_eq!(timeline[4], "05. assistant: done");
    }

    #[test]
    fn recommendations_follow_latest_messages() {
        let messages = vec![
            Message::system("You are the release assistant."),
            Message::user("check the build"),
            Message::assistant("The build is green."),
            Message::tool_result("call_1", "12 tests passed"),
            Message::user("now deploy it"),
        ];
        let meta = derive_history_meta(&messages, "default", now());

        assert_eq!(
            meta.recommendations,
            vec![
                "Latest user request: now deploy it".to_string(),
                "Previous assistant response: The build is green.".to_string(),
                "Latest tool insight: 12 tests passed".to_string(),
            ]
        );
        let keys: Vec<&str> = meta.memories.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["recent_session_timeline", "session_system_prompt"]);
        assert_eq!(meta.memories[1].content, "You are the release assistant.");
        assert!(meta.memories[0].content.contains("05. user: now deploy it"));
    }

    #[test]
    fn blank_messages_do_not_replace_recommendations() {
        let messages = vec![Message::user("first request"), Message::user("  ")];
        let meta = derive_history_meta(&messages, "default", now());
        assert_eq!(meta.recommendations, vec!["Latest user request: first request".to_string()]);
    }
}
