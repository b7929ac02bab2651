//! Error types for the ContextWeave domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] aggregates them.
//!
//! Configuration load failures ([`RegistryError`]) and traversal attempts
//! ([`SopError::OutsideRepoRoot`]) are surfaced to the caller. Flush,
//! compression and journal failures are logged by the engine, which then
//! continues with the pre-operation state.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all ContextWeave operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("SOP error: {0}")]
    Sop(#[from] SopError),

    #[error("Compression error: {0}")]
    Compression(#[from] CompressionError),

    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Flush hook error: {0}")]
    Flush(#[from] FlushError),

    #[error("Window error: {0}")]
    Window(#[from] WindowError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Static configuration could not be loaded.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("Failed to read {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Voice file for persona '{persona}' not found: {path}")]
    VoiceFileNotFound { persona: String, path: PathBuf },

    #[error("Failed to read voice file for persona '{persona}' at {path}: {reason}")]
    VoiceFileRead {
        persona: String,
        path: PathBuf,
        reason: String,
    },

    #[error("Static context load did not finish within {waited_ms}ms")]
    Deadline { waited_ms: u64 },

    #[error("Static context load task failed: {0}")]
    LoadTask(String),
}

/// SOP reference resolution failed.
#[derive(Debug, Clone, Error)]
pub enum SopError {
    #[error("SOP reference '{reference}' resolves outside repo root")]
    OutsideRepoRoot { reference: String },

    #[error("Failed to read SOP file {path}: {reason}")]
    Read { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum CompressionError {
    #[error("Invalid compression target: {target} tokens")]
    InvalidTarget { target: usize },
}

#[derive(Debug, Clone, Error)]
pub enum FlushError {
    #[error("Flush hook failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Snapshot storage failed: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Error)]
pub enum JournalError {
    #[error("Journal write failed: {0}")]
    Write(String),
}

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("A session with a non-empty id is required to build a context window")]
    MissingSession,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
