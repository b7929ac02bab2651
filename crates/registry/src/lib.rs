//! # ContextWeave Registry
//!
//! Loads the static configuration tree (personas, goals, policies, knowledge,
//! worlds) into an immutable, content-versioned [`StaticSnapshot`], and keeps
//! it cached behind a TTL in [`StaticRegistry`].
//!
//! Knowledge packs may point at sections of Markdown SOP documents; those
//! references are resolved by [`SopResolver`] at load time.

pub mod loader;
pub mod registry;
pub mod snapshot;
pub mod sop;

pub use loader::load_static_snapshot;
pub use registry::{
    Clock, DEFAULT_TTL, RegistryMetrics, RegistryStats, StaticRegistry, SystemClock,
};
pub use snapshot::{StaticSnapshot, hash_static_snapshot};
pub use sop::{
    MAX_SOP_CONTENT_BYTES, SopResolver, extract_markdown_section, parse_sop_ref, slugify_heading,
    sop_ref_label,
};
