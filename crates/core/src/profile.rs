//! Static configuration profiles.
//!
//! Each YAML document under the configuration root maps to one of these
//! records. Every field is optional in YAML (`#[serde(default)]`), so a
//! profile that omits its `id` gets one assigned by the loader.
//!
//! Collections that end up serialized into the snapshot fingerprint use
//! ordered maps so the serialized form is stable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Agent persona: tone, risk appetite, and voice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaProfile {
    pub id: String,
    pub tone: String,
    pub risk_profile: String,
    pub decision_style: String,
    /// Inline voice text. Takes precedence over `voice_path`.
    pub voice: String,
    /// Path to a file holding the voice text, relative to the persona file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_path: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub taboo_topics: Vec<String>,
}

impl PersonaProfile {
    /// The synthetic persona used when no persona files exist.
    pub fn synthetic_default() -> Self {
        Self {
            id: "default".into(),
            tone: "neutral".into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalProfile {
    pub id: String,
    pub long_term: Vec<String>,
    pub mid_term: Vec<String>,
    pub success_metrics: Vec<String>,
}

impl GoalProfile {
    pub fn synthetic_default() -> Self {
        Self {
            id: "default".into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyRule {
    pub id: String,
    pub hard_constraints: Vec<String>,
    pub soft_preferences: Vec<String>,
    pub reward_hooks: Vec<String>,
}

/// A knowledge pack: SOP references, RAG collections and memory keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeReference {
    pub id: String,
    pub description: String,
    /// `path#anchor` references into the SOP document tree.
    pub sop_refs: Vec<String>,
    pub rag_collections: Vec<String>,
    pub memory_keys: Vec<String>,
    /// Resolved SOP text keyed by the original reference string.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub resolved_sop_content: BTreeMap<String, String>,
}

/// Deployment world: environment, capabilities and limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldProfile {
    pub id: String,
    pub environment: String,
    pub capabilities: Vec<String>,
    pub limits: Vec<String>,
    pub cost_model: Vec<String>,
}

impl WorldProfile {
    pub fn synthetic_default() -> Self {
        Self {
            id: "default".into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persona_fields_default_when_missing() {
        let persona: PersonaProfile = serde_json::from_str(r#"{"tone":"direct"}"#).unwrap();
        assert_eq!(persona.tone, "direct");
        assert!(persona.id.is_empty());
        assert!(persona.voice_path.is_none());
    }

    #[test]
    fn synthetic_defaults_carry_default_id() {
        assert_eq!(PersonaProfile::synthetic_default().id, "default");
        assert_eq!(GoalProfile::synthetic_default().id, "default");
        assert_eq!(WorldProfile::synthetic_default().id, "default");
    }
}
