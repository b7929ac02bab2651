//! Subcommand implementations and shared helpers.

pub mod budget;
pub mod config_cmd;
pub mod rank;
pub mod snapshot;
pub mod sop;

use anyhow::Context;
use contextweave_config::AppConfig;
use contextweave_core::Message;
use std::path::Path;
use tracing::debug;

/// Load the config file (explicit path or the default location), then apply
/// environment overrides.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let Some(path) = path else {
        return AppConfig::load().context("Failed to load config");
    };
    let mut config = AppConfig::load_from(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    config
        .apply_env_overrides(|key| std::env::var(key).ok())
        .context("Invalid environment override")?;
    Ok(config)
}

/// Read a conversation file: a JSON array of messages.
pub fn read_conversation(path: &Path) -> anyhow::Result<Vec<Message>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let messages: Vec<Message> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON message array", path.display()))?;
    debug!(file = %path.display(), messages = messages.len(), "Conversation loaded");
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contextweave_core::{MessageSource, Role};
    use tempfile::TempDir;

    #[test]
    fn conversation_defaults_optional_fields() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("chat.json");
        std::fs::write(
            &path,
            r#"[
                {"role": "system", "source": "system_prompt", "content": "Be brief."},
                {"role": "user", "content": "hello"}
            ]"#,
        )
        .unwrap();

        let messages = read_conversation(&path).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].source, MessageSource::SystemPrompt);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].source, MessageSource::Unknown);
        assert!(!messages[1].id.is_empty());
    }

    #[test]
    fn conversation_must_be_an_array() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("chat.json");
        std::fs::write(&path, r#"{"role": "user"}"#).unwrap();
        let err = read_conversation(&path).unwrap_err();
        assert!(err.to_string().contains("not a JSON message array"));

        assert!(read_conversation(&tmp.path().join("missing.json")).is_err());
    }

    #[test]
    fn explicit_config_path_is_loaded() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.toml");
        std::fs::write(
            &path,
            "[context]\naggressive_max_turns = 3\n\n[sop]\nmax_bytes = 512\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.context.aggressive_max_turns, 3);
        assert_eq!(config.sop.max_bytes, 512);
    }

    #[test]
    fn invalid_config_is_reported() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "[context]\ncompression_threshold = 1.5\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
