//! End-to-end tests for the config-driven pipeline: a config file on disk
//! drives the registry, the SOP resolver, window assembly and budgeting.

use contextweave_budget::{
    BudgetAction, CompactionEngine, budget_check, estimate_messages_tokens,
};
use contextweave_config::AppConfig;
use contextweave_core::{ContextWindowConfig, Message, Role, Session};
use contextweave_registry::{SopResolver, StaticRegistry};
use contextweave_window::ContextManager;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

// ── Fixtures ─────────────────────────────────────────────────────────────

fn write(path: &Path, body: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, body).unwrap();
}

struct Workspace {
    _tmp: TempDir,
    config: AppConfig,
}

/// A context tree, an SOP repository and a config file pointing at both.
fn workspace(sop_max_bytes: usize) -> Workspace {
    let tmp = TempDir::new().unwrap();
    let tree = tmp.path().join("context");
    let repo = tmp.path().join("repo");

    write(
        &tree.join("personas/default.yaml"),
        "id: default\ntone: calm\nvoice: Speak like an on-call lead.\n",
    );
    write(
        &tree.join("goals/default.yaml"),
        "id: default\nlong_term:\n  - Keep the release train moving\n",
    );
    write(
        &tree.join("knowledge/ops.yaml"),
        "id: ops\nsop_refs:\n  - docs/runbook.md#deploy\n",
    );
    write(
        &tree.join("worlds/default.yaml"),
        "id: default\nenvironment: staging\n",
    );
    write(
        &repo.join("docs/runbook.md"),
        concat!(
            "# Runbook\n\n## Deploy\n\n",
            "Tag the release, then run the deploy job and watch the canary dashboards ",
            "for ten minutes.\n\n",
            "## Rollback\n\nRevert the tag.\n",
        ),
    );

    let config_path = tmp.path().join("config.toml");
    write(
        &config_path,
        &format!(
            concat!(
                "[context]\nconfig_root = '{}'\nttl_secs = 60\ntoken_limit = 100\n\n",
                "[sop]\nrepo_root = '{}'\nmax_bytes = {}\n",
            ),
            tree.display(),
            repo.display(),
            sop_max_bytes
        ),
    );

    let config = AppConfig::load_from(&config_path).unwrap();
    Workspace { _tmp: tmp, config }
}

fn registry_from(config: &AppConfig) -> StaticRegistry {
    StaticRegistry::new(config.resolve_context_root())
        .with_ttl(Duration::from_secs(config.context.ttl_secs))
        .with_sop_resolver(Arc::new(SopResolver::new(
            config.resolve_sop_root(),
            config.sop.max_bytes,
        )))
}

fn long_conversation(turns: usize) -> Vec<Message> {
    let mut messages = vec![Message::system("You coordinate releases.")];
    for i in 0..turns {
        messages.push(Message::user(format!("Status of release candidate {i}?")));
        messages.push(Message::assistant(format!("Candidate {i} passed smoke tests.")));
    }
    messages
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_config_file_drives_window_assembly() {
    let ws = workspace(4096);
    assert_eq!(ws.config.context.ttl_secs, 60);

    let registry = registry_from(&ws.config);
    assert_eq!(registry.ttl(), Duration::from_secs(60));

    let manager = ContextManager::new(Arc::new(registry));
    let window = manager
        .build_window(
            &Session::new("release-42").with_messages(vec![Message::user("Ship it?")]),
            &ContextWindowConfig::default(),
        )
        .await
        .unwrap();

    let prompt = &window.system_prompt;
    assert!(prompt.contains("Speak like an on-call lead."));
    assert!(prompt.contains("Keep the release train moving"));
    assert!(prompt.contains("SOP [runbook > deploy]"));
    assert!(prompt.contains("watch the canary dashboards"));
    assert!(!prompt.contains("Revert the tag."));
    assert_eq!(window.static_context.version.len(), 64);
    assert_eq!(window.static_context.world.environment, "staging");
}

#[tokio::test]
async fn e2e_sop_byte_ceiling_from_config() {
    let ws = workspace(24);
    let snapshot = registry_from(&ws.config).current_snapshot().await.unwrap();

    let ops = &snapshot.knowledge["ops"];
    let content = &ops.resolved_sop_content["docs/runbook.md#deploy"];
    assert!(content.ends_with("... (truncated)"));
    assert!(!content.contains("canary"));
}

#[tokio::test]
async fn e2e_budget_thresholds_from_config() {
    let ws = workspace(4096);
    let ctx = &ws.config.context;
    let engine = CompactionEngine::new().with_threshold(ctx.compression_threshold);

    let messages = long_conversation(2);
    let tokens = estimate_messages_tokens(&messages);
    assert!(tokens < 80);
    assert_eq!(
        budget_check(tokens, ctx.token_limit, ctx.compression_threshold, ctx.aggressive_threshold),
        BudgetAction::Ok
    );

    let messages = long_conversation(8);
    let tokens = estimate_messages_tokens(&messages);
    assert!(tokens >= 95);
    assert_eq!(
        budget_check(tokens, ctx.token_limit, ctx.compression_threshold, ctx.aggressive_threshold),
        BudgetAction::AggressiveTrim
    );

    let trimmed = engine.aggressive_trim(&messages, ctx.aggressive_max_turns);
    let user_turns = trimmed.iter().filter(|m| m.role == Role::User).count();
    assert_eq!(user_turns, ctx.aggressive_max_turns);
    assert_eq!(trimmed[0].content, "You coordinate releases.");

    let (compacted, applied) = engine.auto_compact(&messages, ctx.token_limit);
    assert!(applied);
    assert!(compacted.len() < messages.len());
}

#[tokio::test]
async fn e2e_window_auto_compacts_against_configured_limit() {
    let ws = workspace(4096);
    let manager = ContextManager::new(Arc::new(registry_from(&ws.config)));
    let messages = long_conversation(8);

    let cfg = ContextWindowConfig {
        token_limit: ws.config.context.token_limit,
        ..ContextWindowConfig::default()
    };
    let window = manager
        .build_window(&Session::new("s1").with_messages(messages.clone()), &cfg)
        .await
        .unwrap();

    assert!(window.messages.len() < messages.len());
    assert_eq!(window.messages[0].content, "You coordinate releases.");
}
