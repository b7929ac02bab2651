//! # ContextWeave Core
//!
//! Domain types, collaborator traits, and error definitions for the
//! ContextWeave context-budget engine. This crate has **no I/O of its own**;
//! it defines the model that the budget, registry, and window crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Everything the engine consumes but does not own (session state storage,
//! turn journals, pre-compaction flush hooks, prompt rendering) is a trait
//! here. Implementations live in their respective crates, or in the host
//! application. This keeps the budgeting code pure and lets tests swap in
//! stubs.

pub mod error;
pub mod hook;
pub mod journal;
pub mod message;
pub mod profile;
pub mod session;
pub mod window;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use hook::FlushHook;
pub use journal::{JournalWriter, TurnJournalEntry};
pub use message::{
    Message, MessageSource, MessageToolCall, MetaValue, Metadata, Role, ToolResultRecord,
};
pub use profile::{GoalProfile, KnowledgeReference, PersonaProfile, PolicyRule, WorldProfile};
pub use session::{Belief, FeedbackSignal, PlanNode, Session, StateSnapshot, StateStore, TurnRecord};
pub use window::{
    ContextWindow, ContextWindowConfig, DynamicContext, MemoryFragment, MetaContext,
    PromptComposer, PromptInput, StaticContext,
};
