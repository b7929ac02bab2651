//! Reads the configuration tree from disk.
//!
//! ```text
//! <root>/
//! ├── personas/*.yaml
//! ├── goals/*.yaml
//! ├── policies/*.yaml
//! ├── knowledge/*.yaml
//! └── worlds/*.yaml
//! ```
//!
//! A missing sub-directory is an empty section. A document without an `id`
//! is keyed by its file stem. Personas, goals and worlds fall back to a
//! synthetic `default` entry when their section is empty; policies do not.

use crate::snapshot::StaticSnapshot;
use crate::sop::SopResolver;
use chrono::{DateTime, Utc};
use contextweave_core::error::RegistryError;
use contextweave_core::{GoalProfile, KnowledgeReference, PersonaProfile, PolicyRule, WorldProfile};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A profile record that carries its own id.
trait Profile: DeserializeOwned {
    fn id(&self) -> &str;
    fn id_mut(&mut self) -> &mut String;
}

macro_rules! impl_profile {
    ($($ty:ty),*) => {
        $(impl Profile for $ty {
            fn id(&self) -> &str {
                &self.id
            }

            fn id_mut(&mut self) -> &mut String {
                &mut self.id
            }
        })*
    };
}

impl_profile!(PersonaProfile, GoalProfile, PolicyRule, KnowledgeReference, WorldProfile);

/// Load the whole tree under `root` into a versioned snapshot.
///
/// SOP references are resolved before the version is computed, so a changed
/// SOP section changes the version too.
pub fn load_static_snapshot(
    root: &Path,
    sop: Option<&SopResolver>,
    now: DateTime<Utc>,
) -> Result<StaticSnapshot, RegistryError> {
    if !root.is_dir() {
        return Err(RegistryError::Read {
            path: root.to_path_buf(),
            reason: "configuration root is not a directory".into(),
        });
    }

    let persona_files = load_section::<PersonaProfile>(root, "personas")?;
    let mut personas = BTreeMap::new();
    for (path, mut persona) in persona_files {
        hydrate_voice(&path, &mut persona)?;
        personas.insert(persona.id.clone(), persona);
    }
    if personas.is_empty() {
        personas.insert("default".into(), PersonaProfile::synthetic_default());
    }

    let mut goals = into_map(load_section::<GoalProfile>(root, "goals")?);
    if goals.is_empty() {
        goals.insert("default".into(), GoalProfile::synthetic_default());
    }

    let policies = into_map(load_section::<PolicyRule>(root, "policies")?);

    let mut knowledge = into_map(load_section::<KnowledgeReference>(root, "knowledge")?);
    if let Some(resolver) = sop {
        for entry in knowledge.values_mut() {
            resolver.resolve_knowledge(entry);
        }
    }

    let mut worlds = into_map(load_section::<WorldProfile>(root, "worlds")?);
    if worlds.is_empty() {
        worlds.insert("default".into(), WorldProfile::synthetic_default());
    }

    Ok(StaticSnapshot::new(
        personas, goals, policies, knowledge, worlds, now,
    ))
}

fn into_map<T: Profile>(entries: Vec<(PathBuf, T)>) -> BTreeMap<String, T> {
    entries
        .into_iter()
        .map(|(_, profile)| (profile.id().to_string(), profile))
        .collect()
}

/// Parse every `*.yaml` / `*.yml` file in `<root>/<dir>`, in file-name order.
fn load_section<T: Profile>(root: &Path, dir: &str) -> Result<Vec<(PathBuf, T)>, RegistryError> {
    let section_dir = root.join(dir);
    if !section_dir.is_dir() {
        debug!(dir = %section_dir.display(), "Context section directory absent");
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(&section_dir)
        .map_err(|e| RegistryError::Read {
            path: section_dir.clone(),
            reason: e.to_string(),
        })?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext == "yaml" || ext == "yml")
        })
        .collect();
    files.sort();

    let mut loaded: Vec<(PathBuf, T)> = Vec::with_capacity(files.len());
    for path in files {
        let raw = std::fs::read_to_string(&path).map_err(|e| RegistryError::Read {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        if raw.trim().is_empty() {
            debug!(file = %path.display(), "Skipping empty context file");
            continue;
        }
        let mut profile: T = serde_yaml::from_str(&raw).map_err(|e| RegistryError::Parse {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let id = profile.id().trim().to_string();
        let id = if id.is_empty() { file_stem(&path) } else { id };
        *profile.id_mut() = id.clone();

        if let Some((previous, _)) = loaded.iter().find(|(_, p)| p.id() == id) {
            warn!(
                id = %id,
                file = %path.display(),
                previous = %previous.display(),
                "Duplicate context id, later file wins"
            );
        }
        debug!(file = %path.display(), section = dir, "Loaded context file");
        loaded.push((path, profile));
    }
    Ok(loaded)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Fill an empty inline voice from `voice_path`, relative to the persona file.
fn hydrate_voice(persona_file: &Path, persona: &mut PersonaProfile) -> Result<(), RegistryError> {
    if !persona.voice.trim().is_empty() {
        return Ok(());
    }
    let Some(voice_path) = persona
        .voice_path
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
    else {
        return Ok(());
    };

    let base = persona_file.parent().unwrap_or_else(|| Path::new("."));
    let path = base.join(voice_path);
    match std::fs::read_to_string(&path) {
        Ok(voice) => {
            persona.voice = voice.trim().to_string();
            debug!(persona = %persona.id, file = %path.display(), "Hydrated persona voice");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RegistryError::VoiceFileNotFound {
            persona: persona.id.clone(),
            path,
        }),
        Err(e) => Err(RegistryError::VoiceFileRead {
            persona: persona.id.clone(),
            path,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, dir: &str, name: &str, body: &str) {
        let dir = root.join(dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn loads_every_section() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(
            root,
            "personas",
            "default.yaml",
            concat!(
                "id: default\ntone: direct\nrisk_profile: moderate\n",
                "decision_style: evidence-first\nvoice: Speak plainly.\n",
            ),
        );
        write(
            root,
            "goals",
            "ship.yaml",
            "id: ship\nlong_term:\n  - Ship reliable releases\n",
        );
        write(
            root,
            "policies",
            "safety.yaml",
            "id: safety\nhard_constraints:\n  - No secrets in logs\n",
        );
        write(
            root,
            "knowledge",
            "ops.yml",
            "id: ops\ndescription: Runbooks\nmemory_keys: [oncall]\n",
        );
        write(
            root,
            "worlds",
            "prod.yaml",
            "id: prod\nenvironment: production\ncapabilities:\n  - deploy\n",
        );
        write(root, "worlds", "notes.txt", "ignored");

        let snapshot = load_static_snapshot(root, None, Utc::now()).unwrap();
        assert_eq!(snapshot.personas["default"].voice, "Speak plainly.");
        assert_eq!(snapshot.goals["ship"].long_term, vec!["Ship reliable releases"]);
        assert_eq!(snapshot.policies["safety"].hard_constraints.len(), 1);
        assert_eq!(snapshot.knowledge["ops"].memory_keys, vec!["oncall"]);
        assert_eq!(snapshot.worlds.len(), 1);
        assert_eq!(snapshot.worlds["prod"].environment, "production");
        assert_eq!(snapshot.version.len(), 64);
    }

    #[test]
    fn empty_root_gets_synthetic_defaults() {
        let tmp = TempDir::new().unwrap();
        let snapshot = load_static_snapshot(tmp.path(), None, Utc::now()).unwrap();
        assert_eq!(snapshot.personas["default"].tone, "neutral");
        assert!(snapshot.goals.contains_key("default"));
        assert!(snapshot.worlds.contains_key("default"));
        assert!(snapshot.policies.is_empty());
        assert!(snapshot.knowledge.is_empty());
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_static_snapshot(&tmp.path().join("absent"), None, Utc::now()).unwrap_err();
        assert!(matches!(err, RegistryError::Read { .. }));
    }

    #[test]
    fn id_falls_back_to_file_stem() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "goals", "research.yaml", "mid_term:\n  - Survey papers\n");
        let snapshot = load_static_snapshot(tmp.path(), None, Utc::now()).unwrap();
        assert_eq!(snapshot.goals["research"].id, "research");
        assert!(!snapshot.goals.contains_key("default"));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "personas", "broken.yaml", "id: [unclosed\n");
        let err = load_static_snapshot(tmp.path(), None, Utc::now()).unwrap_err();
        assert!(matches!(err, RegistryError::Parse { .. }));
    }

    #[test]
    fn voice_is_hydrated_from_file() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "personas", "alex.yaml", "id: alex\nvoice_path: voices/alex.md\n");
        write(tmp.path(), "personas/voices", "alex.md", "\nOperate like ALEX.\n");
        let snapshot = load_static_snapshot(tmp.path(), None, Utc::now()).unwrap();
        assert_eq!(snapshot.personas["alex"].voice, "Operate like ALEX.");
    }

    #[test]
    fn inline_voice_wins_over_file() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "personas",
            "alex.yaml",
            "id: alex\nvoice: Inline.\nvoice_path: missing.md\n",
        );
        let snapshot = load_static_snapshot(tmp.path(), None, Utc::now()).unwrap();
        assert_eq!(snapshot.personas["alex"].voice, "Inline.");
    }

    #[test]
    fn missing_voice_file_fails_the_load() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "personas", "alex.yaml", "id: alex\nvoice_path: missing.md\n");
        let err = load_static_snapshot(tmp.path(), None, Utc::now()).unwrap_err();
        match err {
            RegistryError::VoiceFileNotFound { persona, path } => {
                assert_eq!(persona, "alex");
                assert!(path.ends_with("missing.md"));
            }
            other => panic!("expected VoiceFileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn sop_content_feeds_the_version() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("context");
        write(
            &root,
            "knowledge",
            "ops.yaml",
            "id: ops\nsop_refs:\n  - docs/runbook.md#deploy\n",
        );
        write(tmp.path(), "docs", "runbook.md", "# Runbook\n\n## Deploy\n\nRoll out slowly.\n");

        let resolver = SopResolver::new(tmp.path(), 0);
        let first = load_static_snapshot(&root, Some(&resolver), Utc::now()).unwrap();
        assert!(first.knowledge["ops"].resolved_sop_content["docs/runbook.md#deploy"]
            .contains("Roll out slowly."));

        write(tmp.path(), "docs", "runbook.md", "# Runbook\n\n## Deploy\n\nRoll out fast.\n");
        resolver.invalidate();
        let second = load_static_snapshot(&root, Some(&resolver), Utc::now()).unwrap();
        assert_ne!(first.version, second.version);

        let unresolved = load_static_snapshot(&root, None, Utc::now()).unwrap();
        assert!(unresolved.knowledge["ops"].resolved_sop_content.is_empty());
    }
}
