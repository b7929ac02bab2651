//! Built-in input cost profiles for common models.
//!
//! Prices are in USD per 1K input tokens.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Input pricing and context size for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCostProfile {
    pub name: String,
    /// USD per 1K input tokens.
    pub input_cost_per_1k: f64,
    /// Context window size in tokens.
    pub context_window: usize,
}

impl ModelCostProfile {
    pub fn new(name: impl Into<String>, input_cost_per_1k: f64, context_window: usize) -> Self {
        Self {
            name: name.into(),
            input_cost_per_1k,
            context_window,
        }
    }
}

/// The built-in profile table, keyed by model name.
pub fn default_model_profiles() -> BTreeMap<String, ModelCostProfile> {
    [
        ModelCostProfile::new("gpt-4", 0.03, 8_192),
        ModelCostProfile::new("gpt-3.5-turbo", 0.0005, 16_385),
        ModelCostProfile::new("claude-3-opus", 0.015, 200_000),
        ModelCostProfile::new("claude-3-sonnet", 0.003, 200_000),
        ModelCostProfile::new("deepseek-chat", 0.00014, 64_000),
    ]
    .into_iter()
    .map(|p| (p.name.clone(), p))
    .collect()
}

/// `tokens / 1000 * input_cost_per_1k`, or 0 without a profile.
pub fn estimate_input_cost(tokens: usize, model: Option<&ModelCostProfile>) -> f64 {
    match model {
        Some(profile) => tokens as f64 / 1000.0 * profile.input_cost_per_1k,
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_cost_is_linear() {
        let model = ModelCostProfile::new("gpt-4", 0.03, 8192);
        assert!((estimate_input_cost(1000, Some(&model)) - 0.03).abs() < 1e-12);
        assert!((estimate_input_cost(500, Some(&model)) - 0.015).abs() < 1e-12);
        assert_eq!(estimate_input_cost(1000, None), 0.0);
    }

    #[test]
    fn default_profiles_are_complete() {
        let profiles = default_model_profiles();
        for name in [
            "gpt-4",
            "gpt-3.5-turbo",
            "claude-3-opus",
            "claude-3-sonnet",
            "deepseek-chat",
        ] {
            let profile = &profiles[name];
            assert_eq!(profile.name, name);
            assert!(profile.input_cost_per_1k > 0.0);
            assert!(profile.context_window > 0);
        }
    }
}
