//! # ContextWeave Window
//!
//! Assembles the per-call [`ContextWindow`](contextweave_core::ContextWindow)
//! from three layers: the cached static snapshot, the session's latest
//! dynamic state, and meta guidance derived from recent history.
//!
//! Also ships the default collaborators: an in-memory state store, a JSONL
//! turn journal, and a plain-text prompt composer.

pub mod composer;
pub mod journal;
pub mod manager;
pub mod meta;
pub mod store;

pub use composer::DefaultPromptComposer;
pub use journal::JsonlJournalWriter;
pub use manager::{ContextManager, build_tool_hints};
pub use meta::{HISTORY_TIMELINE_LIMIT, build_history_timeline, derive_history_meta};
pub use store::InMemoryStateStore;
