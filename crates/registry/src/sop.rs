//! SOP reference resolution.
//!
//! A knowledge pack names procedure documents as `path#anchor` references.
//! The resolver loads the file from under the repository root, cuts out the
//! Markdown section whose heading slug matches the anchor, and caps the
//! result at a byte ceiling.
//!
//! Results are cached per (file, anchor) for the life of the resolver. A
//! cached entry is served even if the file changes on disk; call
//! [`SopResolver::invalidate`] to drop the cache.

use contextweave_core::KnowledgeReference;
use contextweave_core::error::SopError;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Default ceiling on resolved content, in bytes.
pub const MAX_SOP_CONTENT_BYTES: usize = 8192;

const TRUNCATION_MARKER: &str = "\n... (truncated)";

/// Resolves `path#anchor` references against a repository root.
pub struct SopResolver {
    repo_root: PathBuf,
    max_bytes: usize,
    cache: Mutex<HashMap<(PathBuf, String), String>>,
}

impl SopResolver {
    /// Create a resolver rooted at `repo_root`. A `max_bytes` of zero uses
    /// [`MAX_SOP_CONTENT_BYTES`].
    pub fn new(repo_root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        let root = repo_root.into();
        let repo_root = std::fs::canonicalize(&root).unwrap_or(root);
        Self {
            repo_root,
            max_bytes: if max_bytes == 0 {
                MAX_SOP_CONTENT_BYTES
            } else {
                max_bytes
            },
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Resolve one reference.
    ///
    /// A missing file resolves to an empty string. An anchor that matches no
    /// heading resolves to the whole file. A path that lands outside the
    /// repository root is an error.
    pub fn resolve_ref(&self, reference: &str) -> Result<String, SopError> {
        let (file, anchor) = parse_sop_ref(reference);
        if file.is_empty() {
            return Ok(String::new());
        }

        let path = self.resolve_path(reference, file)?;
        let key = (path.clone(), anchor.to_string());
        if let Some(hit) = self.lock_cache().get(&key) {
            return Ok(hit.clone());
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(reference, file = %path.display(), "SOP file not found");
                return Ok(String::new());
            }
            Err(e) => {
                return Err(SopError::Read {
                    path,
                    reason: e.to_string(),
                });
            }
        };

        let section = if anchor.is_empty() {
            content
        } else {
            let section = extract_markdown_section(&content, anchor);
            if section.is_empty() {
                debug!(reference, anchor, "SOP anchor not found, using whole file");
                content
            } else {
                section
            }
        };

        let resolved = truncate_to_bytes(section, self.max_bytes);
        self.lock_cache().insert(key, resolved.clone());
        Ok(resolved)
    }

    /// Fill `resolved_sop_content` for one knowledge entry. References that
    /// fail or resolve to nothing are logged and left out.
    pub fn resolve_knowledge(&self, knowledge: &mut KnowledgeReference) {
        for reference in &knowledge.sop_refs {
            match self.resolve_ref(reference) {
                Ok(content) if !content.trim().is_empty() => {
                    knowledge
                        .resolved_sop_content
                        .insert(reference.clone(), content);
                }
                Ok(_) => {
                    debug!(
                        knowledge = %knowledge.id,
                        reference = %reference,
                        "SOP reference resolved empty"
                    );
                }
                Err(e) => {
                    warn!(
                        knowledge = %knowledge.id,
                        reference = %reference,
                        error = %e,
                        "Failed to resolve SOP reference"
                    );
                }
            }
        }
    }

    /// Resolve every entry's references, returning enriched copies.
    pub fn resolve_knowledge_refs(&self, refs: &[KnowledgeReference]) -> Vec<KnowledgeReference> {
        refs.iter()
            .cloned()
            .map(|mut knowledge| {
                self.resolve_knowledge(&mut knowledge);
                knowledge
            })
            .collect()
    }

    /// Drop all cached resolutions.
    pub fn invalidate(&self) {
        self.lock_cache().clear();
    }

    fn resolve_path(&self, reference: &str, file: &str) -> Result<PathBuf, SopError> {
        let joined = normalize_lexically(&self.repo_root.join(file));
        // Existing files are canonicalized so symlinks cannot escape the root.
        let resolved = std::fs::canonicalize(&joined).unwrap_or(joined);
        if !resolved.starts_with(&self.repo_root) {
            return Err(SopError::OutsideRepoRoot {
                reference: reference.trim().to_string(),
            });
        }
        Ok(resolved)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<(PathBuf, String), String>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Reference parsing ─────────────────────────────────────────────────────

/// Split a reference on its last `#` into `(file, anchor)`.
pub fn parse_sop_ref(reference: &str) -> (&str, &str) {
    let reference = reference.trim();
    match reference.rfind('#') {
        Some(idx) => (&reference[..idx], &reference[idx + 1..]),
        None => (reference, ""),
    }
}

/// Human label for a reference: `TASK_FLOW.md#todo-lifecycle` becomes
/// `TASK FLOW > todo lifecycle`.
pub fn sop_ref_label(reference: &str) -> String {
    let (file, anchor) = parse_sop_ref(reference);
    let stem = Path::new(file)
        .file_stem()
        .map(|s| s.to_string_lossy().replace(['_', '-'], " "))
        .unwrap_or_default();
    let anchor = anchor.replace('-', " ");
    match (stem.is_empty(), anchor.is_empty()) {
        (_, true) => stem,
        (true, false) => anchor,
        (false, false) => format!("{stem} > {anchor}"),
    }
}

// ── Markdown sections ─────────────────────────────────────────────────────

/// GitHub-style heading slug: lower-case, whitespace runs become a single
/// hyphen, anything outside `[a-z0-9-]` is dropped.
pub fn slugify_heading(heading: &str) -> String {
    let lowered = heading.trim().to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut in_space = false;
    for ch in lowered.chars() {
        if ch.is_whitespace() {
            if !in_space {
                slug.push('-');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' {
            slug.push(ch);
        }
    }
    slug
}

/// Extract the section whose heading slug equals `anchor`.
///
/// The section runs from the heading up to the next heading of the same or
/// shallower level. Returns the whole document for an empty anchor and an
/// empty string when no heading matches.
pub fn extract_markdown_section(content: &str, anchor: &str) -> String {
    if anchor.is_empty() {
        return content.to_string();
    }

    let mut start: Option<(usize, usize)> = None;
    let mut offset = 0;
    let mut in_fence = false;

    for line in content.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        let Some((level, title)) = heading(line) else {
            continue;
        };

        match start {
            None if slugify_heading(title) == anchor => start = Some((line_start, level)),
            Some((begin, open_level)) if level <= open_level => {
                return content[begin..line_start].trim_end().to_string();
            }
            _ => {}
        }
    }

    match start {
        Some((begin, _)) => content[begin..].trim_end().to_string(),
        None => String::new(),
    }
}

/// `(level, title)` for an ATX heading line.
fn heading(line: &str) -> Option<(usize, &str)> {
    let line = line.trim_end();
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &line[level..];
    if !rest.is_empty() && !rest.starts_with(' ') && !rest.starts_with('\t') {
        return None;
    }
    let title = rest.trim();
    // Optional closing sequence: `## Title ##`.
    let unclosed = title.trim_end_matches('#');
    let title = if unclosed.is_empty() {
        unclosed
    } else if unclosed.ends_with([' ', '\t']) {
        unclosed.trim_end()
    } else {
        title
    };
    Some((level, title))
}

fn truncate_to_bytes(content: String, max_bytes: usize) -> String {
    if content.len() <= max_bytes {
        return content;
    }
    let mut cut = max_bytes;
    while !content.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{TRUNCATION_MARKER}", &content[..cut])
}

/// Collapse `.` and `..` without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
