//! Configuration loading, validation, and management for ContextWeave.
//!
//! Loads configuration from `~/.contextweave/config.toml` with environment
//! variable overrides. Also locates the static context root
//! (`configs/context`) that the registry reads persona, goal, policy,
//! knowledge and world YAML from.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Selects the static context root, ahead of the config file and discovery.
pub const CONTEXT_DIR_ENV: &str = "CONTEXTWEAVE_CONTEXT_DIR";

/// Overrides `context.token_limit`.
pub const TOKEN_LIMIT_ENV: &str = "CONTEXTWEAVE_TOKEN_LIMIT";

/// Relative location of the static context tree inside a repository.
pub const DEFAULT_CONTEXT_DIR: &str = "configs/context";

/// The root configuration structure.
///
/// Maps directly to `~/.contextweave/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Context budgeting and registry settings
    #[serde(default)]
    pub context: ContextConfig,

    /// SOP document resolution
    #[serde(default)]
    pub sop: SopConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Explicit static context root. Discovered when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_root: Option<PathBuf>,

    /// Registry snapshot lifetime in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Token ceiling used for auto-compaction
    #[serde(default = "default_token_limit")]
    pub token_limit: usize,

    /// Fraction of the limit above which compaction kicks in
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: f64,

    /// Fraction of the limit above which aggressive trimming kicks in
    #[serde(default = "default_aggressive_threshold")]
    pub aggressive_threshold: f64,

    /// Turns kept by aggressive trimming
    #[serde(default = "default_aggressive_max_turns")]
    pub aggressive_max_turns: usize,
}

fn default_ttl_secs() -> u64 {
    30 * 60
}
fn default_token_limit() -> usize {
    128_000
}
fn default_compression_threshold() -> f64 {
    0.8
}
fn default_aggressive_threshold() -> f64 {
    0.95
}
fn default_aggressive_max_turns() -> usize {
    6
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            config_root: None,
            ttl_secs: default_ttl_secs(),
            token_limit: default_token_limit(),
            compression_threshold: default_compression_threshold(),
            aggressive_threshold: default_aggressive_threshold(),
            aggressive_max_turns: default_aggressive_max_turns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SopConfig {
    /// Repository root SOP references resolve against. Defaults to the
    /// working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_root: Option<PathBuf>,

    /// Byte ceiling for resolved SOP content
    #[serde(default = "default_sop_max_bytes")]
    pub max_bytes: usize,
}

fn default_sop_max_bytes() -> usize {
    8192
}

impl Default for SopConfig {
    fn default() -> Self {
        Self {
            repo_root: None,
            max_bytes: default_sop_max_bytes(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.contextweave/config.toml).
    ///
    /// Environment variables override file values:
    /// - `CONTEXTWEAVE_CONTEXT_DIR` sets `context.config_root`
    /// - `CONTEXTWEAVE_TOKEN_LIMIT` sets `context.token_limit`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(CONTEXT_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.context.config_root = Some(PathBuf::from(dir.trim()));
        }

        if let Some(raw) = lookup(TOKEN_LIMIT_ENV) {
            self.context.token_limit = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "{TOKEN_LIMIT_ENV} must be a non-negative integer, got '{raw}'"
                ))
            })?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".contextweave")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ctx = &self.context;
        for (name, value) in [
            ("compression_threshold", ctx.compression_threshold),
            ("aggressive_threshold", ctx.aggressive_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::ValidationError(format!(
                    "context.{name} must be in (0, 1], got {value}"
                )));
            }
        }

        if ctx.aggressive_threshold < ctx.compression_threshold {
            return Err(ConfigError::ValidationError(
                "context.aggressive_threshold must be >= context.compression_threshold".into(),
            ));
        }

        Ok(())
    }

    /// The static context root: explicit setting first, then a walk up from
    /// the working directory, then the relative default.
    pub fn resolve_context_root(&self) -> PathBuf {
        if let Some(root) = &self.context.config_root {
            return root.clone();
        }
        std::env::current_dir()
            .ok()
            .and_then(|cwd| search_context_root_from_dir(&cwd))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTEXT_DIR))
    }

    /// Repository root for SOP references.
    pub fn resolve_sop_root(&self) -> PathBuf {
        self.sop
            .repo_root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Walk from `start` towards the filesystem root looking for
/// `configs/context`.
pub fn search_context_root_from_dir(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(DEFAULT_CONTEXT_DIR))
        .find(|candidate| candidate.is_dir())
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.context.ttl_secs, 1800);
        assert_eq!(config.context.token_limit, 128_000);
        assert_eq!(config.sop.max_bytes, 8192);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.context.token_limit, config.context.token_limit);
        assert_eq!(parsed.context.compression_threshold, config.context.compression_threshold);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[context]\ntoken_limit = 4000\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.context.token_limit, 4000);
        assert_eq!(config.context.aggressive_max_turns, 6);
        assert!(config.sop.repo_root.is_none());
    }

    #[test]
    fn invalid_threshold_rejected() {
        let mut config = AppConfig::default();
        config.context.compression_threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.context.compression_threshold = 0.9;
        config.context.aggressive_threshold = 0.85;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[context\n").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.context.token_limit, 128_000);
    }

    #[test]
    fn env_overrides_take_precedence() {
        let env: HashMap<&str, &str> = HashMap::from([
            (CONTEXT_DIR_ENV, "/srv/context"),
            (TOKEN_LIMIT_ENV, "32000"),
        ]);
        let mut config = AppConfig::default();
        config.context.config_root = Some(PathBuf::from("from-file"));
        config
            .apply_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.resolve_context_root(), PathBuf::from("/srv/context"));
        assert_eq!(config.context.token_limit, 32000);
    }

    #[test]
    fn bad_token_limit_override_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env_overrides(|key| {
            (key == TOKEN_LIMIT_ENV).then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn discovery_walks_up_to_context_dir() {
        let dir = tempfile::tempdir().unwrap();
        let context = dir.path().join("configs").join("context");
        std::fs::create_dir_all(&context).unwrap();
        let nested = dir.path().join("services").join("api");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(search_context_root_from_dir(&nested), Some(context));
    }

    #[test]
    fn discovery_returns_none_without_context_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a");
        std::fs::create_dir_all(&nested).unwrap();
        // Ancestors of a temp dir are not expected to carry configs/context.
        let found = search_context_root_from_dir(&nested);
        assert!(found.is_none_or(|p| !p.starts_with(dir.path())));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("[context]"));
        assert!(toml_str.contains("token_limit = 128000"));
    }
}
