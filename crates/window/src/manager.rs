//! The context window manager.
//!
//! Builds a [`ContextWindow`] per LLM call and records finished turns.
//! Collaborators (state store, journal, prompt composer) are optional and
//! injected with `with_*` builders.

use chrono::Utc;
use contextweave_budget::CompactionEngine;
use contextweave_core::error::{StoreError, WindowError};
use contextweave_core::{
    ContextWindow, ContextWindowConfig, DynamicContext, GoalProfile, JournalWriter,
    PersonaProfile, PromptComposer, PromptInput, Session, StateSnapshot, StateStore,
    StaticContext, TurnJournalEntry, TurnRecord, WorldProfile,
};
use contextweave_registry::StaticRegistry;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::composer::DefaultPromptComposer;
use crate::meta::derive_history_meta;

const DEFAULT_KEY: &str = "default";

/// Orchestrates static, dynamic and meta context for a session.
pub struct ContextManager {
    registry: Arc<StaticRegistry>,
    engine: CompactionEngine,
    state_store: Option<Arc<dyn StateStore>>,
    journal: Option<Arc<dyn JournalWriter>>,
    composer: Arc<dyn PromptComposer>,
    preloaded: OnceCell<()>,
}

impl ContextManager {
    pub fn new(registry: Arc<StaticRegistry>) -> Self {
        Self {
            registry,
            engine: CompactionEngine::new(),
            state_store: None,
            journal: None,
            composer: Arc::new(DefaultPromptComposer),
            preloaded: OnceCell::new(),
        }
    }

    pub fn with_compaction_engine(mut self, engine: CompactionEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    pub fn with_journal(mut self, journal: Arc<dyn JournalWriter>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_composer(mut self, composer: Arc<dyn PromptComposer>) -> Self {
        self.composer = composer;
        self
    }

    pub fn registry(&self) -> &StaticRegistry {
        &self.registry
    }

    pub fn compaction_engine(&self) -> &CompactionEngine {
        &self.engine
    }

    /// Load the static snapshot once. A failure is returned and the next
    /// call tries again.
    pub async fn preload(&self) -> Result<(), WindowError> {
        self.preloaded
            .get_or_try_init(|| async { self.registry.ensure().await })
            .await?;
        Ok(())
    }

    /// Assemble the window for one LLM call.
    pub async fn build_window(
        &self,
        session: &Session,
        cfg: &ContextWindowConfig,
    ) -> Result<ContextWindow, WindowError> {
        if session.id.trim().is_empty() {
            return Err(WindowError::MissingSession);
        }
        self.preload().await?;
        let snapshot = self.registry.current_snapshot().await?;

        let persona = select_profile(
            &snapshot.personas,
            &cfg.persona_key,
            session.metadata_value("persona"),
        )
        .cloned()
        .unwrap_or_else(PersonaProfile::synthetic_default);
        let goal = select_profile(&snapshot.goals, &cfg.goal_key, session.metadata_value("goal"))
            .cloned()
            .unwrap_or_else(GoalProfile::synthetic_default);
        let world = select_profile(
            &snapshot.worlds,
            &cfg.world_key,
            session.metadata_value("world"),
        )
        .cloned()
        .unwrap_or_else(WorldProfile::synthetic_default);

        let mut messages = session.messages.clone();
        let mut compacted = false;
        if cfg.token_limit > 0 {
            let (result, applied) = self.engine.auto_compact(&messages, cfg.token_limit);
            if applied {
                messages = result;
                compacted = true;
            }
        }

        let dynamic = self.load_dynamic(&session.id).await;
        let meta = derive_history_meta(&messages, &persona.id, Utc::now());

        let omit_environment = cfg.tool_mode.trim().eq_ignore_ascii_case("web");
        let static_context = StaticContext {
            persona,
            goal,
            // BTreeMap values come out in key order.
            policies: snapshot.policies.values().cloned().collect(),
            knowledge: snapshot.knowledge.values().cloned().collect(),
            tools: build_tool_hints(&cfg.tool_mode, &cfg.tool_preset),
            world,
            environment_summary: if omit_environment {
                String::new()
            } else {
                cfg.environment_summary.clone()
            },
            version: snapshot.version.clone(),
        };

        let system_prompt = self.composer.compose(&PromptInput {
            static_context: &static_context,
            dynamic: &dynamic,
            meta: &meta,
            omit_environment,
        });

        debug!(
            session_id = %session.id,
            version = %static_context.version,
            persona = %static_context.persona.id,
            world = %static_context.world.id,
            messages = messages.len(),
            compacted,
            "Context window built"
        );

        Ok(ContextWindow {
            session_id: session.id.clone(),
            messages,
            system_prompt,
            static_context,
            dynamic,
            meta,
        })
    }

    /// Persist a finished turn and append it to the journal.
    ///
    /// An empty session id is ignored. A state store failure is returned; a
    /// journal failure is only logged.
    pub async fn record_turn(&self, record: &TurnRecord) -> Result<(), StoreError> {
        if record.session_id.is_empty() {
            return Ok(());
        }
        let now = Utc::now();

        if let Some(store) = &self.state_store {
            if let Err(e) = store.save_snapshot(record.to_snapshot(now)).await {
                warn!(
                    session_id = %record.session_id,
                    turn_id = record.turn_id,
                    error = %e,
                    "Failed to persist context snapshot"
                );
                return Err(e);
            }
        }

        if let Some(journal) = &self.journal {
            let entry = TurnJournalEntry::from_record(record, now);
            if let Err(e) = journal.write(entry).await {
                warn!(
                    session_id = %record.session_id,
                    turn_id = record.turn_id,
                    error = %e,
                    "Failed to write turn journal"
                );
            }
        }
        Ok(())
    }

    async fn load_dynamic(&self, session_id: &str) -> DynamicContext {
        let Some(store) = &self.state_store else {
            return DynamicContext::default();
        };
        match store.latest_snapshot(session_id).await {
            Ok(Some(snapshot)) => dynamic_from_snapshot(snapshot),
            Ok(None) => DynamicContext::default(),
            Err(e) => {
                warn!(session_id, error = %e, "State snapshot read failed");
                DynamicContext::default()
            }
        }
    }
}

fn dynamic_from_snapshot(snapshot: StateSnapshot) -> DynamicContext {
    DynamicContext {
        turn_id: snapshot.turn_id,
        llm_turn_seq: snapshot.llm_turn_seq,
        plans: snapshot.plans,
        beliefs: snapshot.beliefs,
        world_state: snapshot.world,
        feedback: snapshot.feedback,
        snapshot_timestamp: Some(snapshot.created_at),
    }
}

/// Pick a profile: explicit key, else the session metadata value, then
/// `default`, then the first key in order.
fn select_profile<'a, T>(
    profiles: &'a BTreeMap<String, T>,
    explicit: &str,
    from_session: Option<&str>,
) -> Option<&'a T> {
    let key = match explicit.trim() {
        "" => from_session.unwrap_or_default(),
        key => key,
    };
    profiles
        .get(key)
        .or_else(|| profiles.get(DEFAULT_KEY))
        .or_else(|| profiles.values().next())
}

/// Tool hints for the environment layer.
///
/// Web mode is non-local; any other mode reports its preset (`full` when
/// unset). Nothing is emitted when neither mode nor preset is configured.
pub fn build_tool_hints(mode: &str, preset: &str) -> Vec<String> {
    let mode = mode.trim().to_lowercase();
    let preset = preset.trim();
    if mode.is_empty() && preset.is_empty() {
        return Vec::new();
    }
    if mode == "web" {
        return vec!["mode=web".into(), "scope=non-local".into()];
    }
    let mode = if mode.is_empty() { "cli" } else { mode.as_str() };
    let preset = if preset.is_empty() { "full" } else { preset };
    vec![format!("mode={mode}"), format!("preset={preset}")]
}
