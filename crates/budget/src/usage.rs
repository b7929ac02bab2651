//! Per-session token and cost quotas.
//!
//! Thread-safe via `RwLock`. Accumulates input/output tokens and estimated
//! spend per session, classifies usage against a [`SessionQuota`], and
//! suggests a cheaper model tier once the warning threshold is crossed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Per-1K input price applied to models missing from the tier table.
const FALLBACK_COST_PER_1K: f64 = 0.001;

/// Output tokens are billed at this multiple of the input price.
const OUTPUT_COST_MULTIPLIER: f64 = 2.0;

const DEFAULT_WARNING_THRESHOLD: f64 = 0.8;

/// One model tier. Higher `priority` means a stronger, pricier model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTier {
    pub name: String,
    pub priority: u32,
    pub cost_per_1k_input: f64,
}

impl ModelTier {
    pub fn new(name: impl Into<String>, priority: u32, cost_per_1k_input: f64) -> Self {
        Self {
            name: name.into(),
            priority,
            cost_per_1k_input,
        }
    }
}

/// The built-in downgrade ladder.
pub fn default_model_tiers() -> Vec<ModelTier> {
    vec![
        ModelTier::new("gpt-4", 6, 0.03),
        ModelTier::new("claude-3-opus", 5, 0.015),
        ModelTier::new("claude-3-sonnet", 4, 0.003),
        ModelTier::new("claude-3-haiku", 3, 0.00025),
        ModelTier::new("gpt-3.5-turbo", 2, 0.0005),
        ModelTier::new("deepseek-chat", 1, 0.00014),
    ]
}

/// Limits for one session. Zero means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionQuota {
    pub max_input_tokens: u64,
    pub max_output_tokens: u64,
    pub max_total_tokens: u64,
    pub max_cost_usd: f64,
    /// Fraction of any limit at which the session enters `Warning`.
    /// Zero means 0.8.
    pub warning_threshold: f64,
}

/// Accumulated usage for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub turn_count: u64,
    pub estimated_cost_usd: f64,
    /// Model used by the most recent call.
    pub last_model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaState {
    Ok,
    Warning,
    Exceeded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaCheck {
    pub state: QuotaState,
    /// Highest usage fraction across all configured limits.
    pub usage_percent: f64,
    /// Tokens left under `max_total_tokens`, or -1 when unlimited.
    pub remaining_tokens: i64,
    /// Cheaper tier to switch to, when not `Ok`.
    pub suggested_model: Option<String>,
}

/// Cost of one call: input at the tier price, output at twice that.
/// Unknown models use a flat fallback rate for both.
pub fn estimate_call_cost(input: u64, output: u64, model: &str, tiers: &[ModelTier]) -> f64 {
    match tiers.iter().find(|t| t.name == model) {
        Some(tier) => {
            let c = tier.cost_per_1k_input;
            input as f64 * c / 1000.0 + output as f64 * c * OUTPUT_COST_MULTIPLIER / 1000.0
        }
        None => (input + output) as f64 * FALLBACK_COST_PER_1K / 1000.0,
    }
}

/// Tracks usage across sessions.
pub struct UsageTracker {
    quota: SessionQuota,
    tiers: Vec<ModelTier>,
    sessions: RwLock<HashMap<String, SessionUsage>>,
}

impl UsageTracker {
    /// Create a tracker. An empty tier list means the built-in tiers.
    pub fn new(quota: SessionQuota, tiers: Vec<ModelTier>) -> Self {
        let tiers = if tiers.is_empty() {
            default_model_tiers()
        } else {
            tiers
        };
        Self {
            quota,
            tiers,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn quota(&self) -> &SessionQuota {
        &self.quota
    }

    pub fn tiers(&self) -> &[ModelTier] {
        &self.tiers
    }

    /// Add one call's usage to a session.
    pub fn record_usage(&self, session_id: &str, input: u64, output: u64, model: &str) {
        let cost = estimate_call_cost(input, output, model, &self.tiers);
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let usage = sessions.entry(session_id.to_string()).or_default();
        usage.input_tokens += input;
        usage.output_tokens += output;
        usage.total_tokens += input + output;
        usage.turn_count += 1;
        usage.estimated_cost_usd += cost;
        usage.last_model = model.to_string();
        debug!(
            session = session_id,
            input,
            output,
            model,
            cost_usd = cost,
            "Recorded session usage"
        );
    }

    /// Usage for a session; zero for unknown sessions.
    pub fn usage(&self, session_id: &str) -> SessionUsage {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(session_id).cloned().unwrap_or_default()
    }

    /// Classify a session against the quota.
    pub fn check(&self, session_id: &str) -> QuotaCheck {
        let usage = self.usage(session_id);
        let usage_percent = self.usage_fraction(&usage);

        let state = if usage_percent >= 1.0 {
            QuotaState::Exceeded
        } else if usage_percent >= self.warning_threshold() {
            QuotaState::Warning
        } else {
            QuotaState::Ok
        };

        let remaining_tokens = if self.quota.max_total_tokens > 0 {
            self.quota.max_total_tokens.saturating_sub(usage.total_tokens) as i64
        } else {
            -1
        };

        let suggested_model = match state {
            QuotaState::Ok => None,
            _ => self.next_cheaper(&usage.last_model),
        };

        QuotaCheck {
            state,
            usage_percent,
            remaining_tokens,
            suggested_model,
        }
    }

    /// Next cheaper tier below `current_model`, once the session is at or
    /// above the warning threshold. `None` for unknown or cheapest models.
    pub fn suggest_downgrade(&self, session_id: &str, current_model: &str) -> Option<String> {
        let usage = self.usage(session_id);
        if self.usage_fraction(&usage) < self.warning_threshold() {
            return None;
        }
        self.next_cheaper(current_model)
    }

    /// Forget a session's usage.
    pub fn reset_session(&self, session_id: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(session_id);
    }

    fn warning_threshold(&self) -> f64 {
        if self.quota.warning_threshold > 0.0 {
            self.quota.warning_threshold
        } else {
            DEFAULT_WARNING_THRESHOLD
        }
    }

    fn usage_fraction(&self, usage: &SessionUsage) -> f64 {
        let q = &self.quota;
        let ratio = |used: f64, limit: f64| if limit > 0.0 { used / limit } else { 0.0 };
        [
            ratio(usage.input_tokens as f64, q.max_input_tokens as f64),
            ratio(usage.output_tokens as f64, q.max_output_tokens as f64),
            ratio(usage.total_tokens as f64, q.max_total_tokens as f64),
            ratio(usage.estimated_cost_usd, q.max_cost_usd),
        ]
        .into_iter()
        .fold(0.0, f64::max)
    }

    fn next_cheaper(&self, model: &str) -> Option<String> {
        let current = self.tiers.iter().find(|t| t.name == model)?;
        self.tiers
            .iter()
            .filter(|t| t.priority < current.priority)
            .max_by_key(|t| t.priority)
            .map(|t| t.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn tracker() -> UsageTracker {
        UsageTracker::new(
            SessionQuota {
                max_input_tokens: 10_000,
                max_output_tokens: 5_000,
                max_total_tokens: 15_000,
                max_cost_usd: 1.0,
                warning_threshold: 0.8,
            },
            default_model_tiers(),
        )
    }

    #[test]
    fn usage_accumulates() {
        let t = tracker();
        t.record_usage("s", 100, 50, "gpt-4");
        t.record_usage("s", 200, 100, "gpt-4");
        let u = t.usage("s");
        assert_eq!(u.input_tokens, 300);
        assert_eq!(u.output_tokens, 150);
        assert_eq!(u.total_tokens, 450);
        assert_eq!(u.turn_count, 2);
        assert!(u.estimated_cost_usd > 0.0);
    }

    #[test]
    fn fresh_session_is_ok() {
        let check = tracker().check("nobody");
        assert_eq!(check.state, QuotaState::Ok);
        assert_eq!(check.usage_percent, 0.0);
        assert_eq!(check.remaining_tokens, 15_000);
        assert!(check.suggested_model.is_none());
    }

    #[test]
    fn warning_above_threshold_suggests_model() {
        let t = tracker();
        t.record_usage("s", 8_500, 4_250, "gpt-4");
        let check = t.check("s");
        assert_eq!(check.state, QuotaState::Warning);
        assert!(check.usage_percent >= 0.8);
        assert_eq!(check.suggested_model.as_deref(), Some("claude-3-opus"));
    }

    #[test]
    fn exceeded_over_quota() {
        let t = tracker();
        t.record_usage("s", 10_000, 6_000, "gpt-4");
        let check = t.check("s");
        assert_eq!(check.state, QuotaState::Exceeded);
        assert!(check.usage_percent >= 1.0);
        assert_eq!(check.remaining_tokens, 0);
    }

    #[test]
    fn single_dimension_limits_trip_exceeded() {
        let input_only = UsageTracker::new(
            SessionQuota { max_input_tokens: 1_000, ..Default::default() },
            vec![],
        );
        input_only.record_usage("s", 1_100, 10, "gpt-4");
        assert_eq!(input_only.check("s").state, QuotaState::Exceeded);

        let output_only = UsageTracker::new(
            SessionQuota { max_output_tokens: 500, ..Default::default() },
            vec![],
        );
        output_only.record_usage("s", 10, 600, "gpt-4");
        assert_eq!(output_only.check("s").state, QuotaState::Exceeded);
    }

    #[test]
    fn downgrade_walks_one_tier() {
        let t = tracker();
        t.record_usage("s", 8_500, 4_250, "claude-3-sonnet");
        assert_eq!(
            t.suggest_downgrade("s", "claude-3-sonnet").as_deref(),
            Some("claude-3-haiku")
        );
    }

    #[test]
    fn no_downgrade_for_cheapest_unknown_or_below_threshold() {
        let t = tracker();
        t.record_usage("cheap", 8_500, 4_250, "deepseek-chat");
        assert!(t.suggest_downgrade("cheap", "deepseek-chat").is_none());

        t.record_usage("custom", 8_500, 4_250, "some-custom-model");
        assert!(t.suggest_downgrade("custom", "some-custom-model").is_none());

        t.record_usage("light", 100, 50, "gpt-4");
        assert!(t.suggest_downgrade("light", "gpt-4").is_none());

        assert!(t.suggest_downgrade("nobody", "gpt-4").is_none());
    }

    #[test]
    fn reset_clears_only_that_session() {
        let t = tracker();
        t.record_usage("s1", 5_000, 2_000, "gpt-4");
        t.record_usage("s2", 100, 50, "gpt-4");
        t.reset_session("s1");
        assert_eq!(t.usage("s1"), SessionUsage::default());
        assert_eq!(t.usage("s2").total_tokens, 150);
        assert_eq!(t.check("s1").state, QuotaState::Ok);
    }

    #[test]
    fn cost_only_quota() {
        let t = UsageTracker::new(
            SessionQuota { max_cost_usd: 0.01, warning_threshold: 0.8, ..Default::default() },
            vec![],
        );
        t.record_usage("s", 10, 5, "deepseek-chat");
        let check = t.check("s");
        assert_eq!(check.state, QuotaState::Ok);
        assert_eq!(check.remaining_tokens, -1);

        for _ in 0..100 {
            t.record_usage("s", 1_000, 500, "gpt-4");
        }
        assert_eq!(t.check("s").state, QuotaState::Exceeded);
        assert!(t.usage("s").estimated_cost_usd > 0.01);
    }

    #[test]
    fn warning_threshold_defaults_when_zero() {
        let quota = SessionQuota {
            max_total_tokens: 10_000,
            ..Default::default()
        };
        let t = UsageTracker::new(quota, vec![]);
        t.record_usage("s", 5_000, 2_500, "gpt-4");
        assert_eq!(t.check("s").state, QuotaState::Ok);
        t.record_usage("s", 500, 500, "gpt-4");
        assert_eq!(t.check("s").state, QuotaState::Warning);
    }

    #[test]
    fn call_cost_formula() {
        let tiers = default_model_tiers();
        let known = estimate_call_cost(1_000, 500, "deepseek-chat", &tiers);
        assert!((known - (0.00014 + 0.00014)).abs() < 1e-12);
        let unknown = estimate_call_cost(1_000, 500, "unknown-model", &tiers);
        assert!((unknown - 0.0015).abs() < 1e-12);
    }

    #[test]
    fn empty_tiers_use_defaults() {
        let t = UsageTracker::new(SessionQuota::default(), vec![]);
        assert_eq!(t.tiers().len(), default_model_tiers().len());
    }

    #[test]
    fn concurrent_recording_and_checking() {
        let t = Arc::new(tracker());
        let mut handles = Vec::new();
        for _ in 0..10 {
            let writer = t.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    writer.record_usage("s", 10, 5, "gpt-4");
                }
            }));
            let reader = t.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    let _ = reader.check("s");
                    let _ = reader.usage("s");
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let u = t.usage("s");
        assert_eq!(u.total_tokens, 10 * 50 * 15);
        assert_eq!(u.turn_count, 500);
    }
}
