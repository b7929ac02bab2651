//! # ContextWeave Budget
//!
//! The pure, per-call half of the context engine: token estimation, message
//! ranking, priority trimming, compaction, and per-session usage quotas.
//! Nothing here performs I/O, and only [`usage::UsageTracker`] holds shared
//! state.

pub mod compaction;
pub mod cost;
pub mod ranker;
pub mod token;
pub mod trimmer;
pub mod usage;

pub use compaction::{BudgetAction, CompactionEngine, budget_check, build_summary};
pub use cost::{ModelCostProfile, default_model_profiles, estimate_input_cost};
pub use ranker::{MessageRanker, RankedMessage, SourceWeights, select_top_n};
pub use token::{HeuristicTokenCounter, TokenCounter, estimate_messages_tokens, estimate_tokens};
pub use trimmer::{TrimConfig, TrimResult, source_priority, trim_messages};
pub use usage::{ModelTier, QuotaCheck, QuotaState, SessionQuota, SessionUsage, UsageTracker};
