//! The immutable static snapshot and its content fingerprint.

use chrono::{DateTime, Utc};
use contextweave_core::{GoalProfile, KnowledgeReference, PersonaProfile, PolicyRule, WorldProfile};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// One load of the configuration tree.
///
/// Every map is keyed by profile id. `version` is a pure function of the
/// five maps (see [`hash_static_snapshot`]); `loaded_at` is not hashed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticSnapshot {
    pub personas: BTreeMap<String, PersonaProfile>,
    pub goals: BTreeMap<String, GoalProfile>,
    pub policies: BTreeMap<String, PolicyRule>,
    pub knowledge: BTreeMap<String, KnowledgeReference>,
    pub worlds: BTreeMap<String, WorldProfile>,
    pub version: String,
    pub loaded_at: DateTime<Utc>,
}

impl StaticSnapshot {
    /// Build a snapshot and stamp its version.
    pub fn new(
        personas: BTreeMap<String, PersonaProfile>,
        goals: BTreeMap<String, GoalProfile>,
        policies: BTreeMap<String, PolicyRule>,
        knowledge: BTreeMap<String, KnowledgeReference>,
        worlds: BTreeMap<String, WorldProfile>,
        loaded_at: DateTime<Utc>,
    ) -> Self {
        let mut snapshot = Self {
            personas,
            goals,
            policies,
            knowledge,
            worlds,
            version: String::new(),
            loaded_at,
        };
        snapshot.version = hash_static_snapshot(&snapshot);
        snapshot
    }
}

/// SHA-256 over every section, entries in sorted key order, values as JSON.
///
/// Each section is prefixed with its own marker and an empty section adds a
/// distinct byte, so "no personas" and "no goals" never collide.
pub fn hash_static_snapshot(snapshot: &StaticSnapshot) -> String {
    let mut hasher = Sha256::new();
    hash_section(&mut hasher, "personas", &snapshot.personas);
    hash_section(&mut hasher, "goals", &snapshot.goals);
    hash_section(&mut hasher, "policies", &snapshot.policies);
    hash_section(&mut hasher, "knowledge", &snapshot.knowledge);
    hash_section(&mut hasher, "worlds", &snapshot.worlds);
    hex::encode(hasher.finalize())
}

fn hash_section<T: Serialize>(hasher: &mut Sha256, marker: &str, entries: &BTreeMap<String, T>) {
    hasher.update(marker.as_bytes());
    hasher.update([0x1d]);
    if entries.is_empty() {
        hasher.update([0x00]);
        return;
    }
    // BTreeMap iterates in key order.
    for (key, value) in entries {
        hasher.update(key.as_bytes());
        hasher.update([0x1f]);
        hasher.update(serde_json::to_vec(value).unwrap_or_default());
        hasher.update([0x1e]);
    }
}
