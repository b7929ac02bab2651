//! `contextweave sop`: Resolve one SOP reference.

use anyhow::Context;
use contextweave_config::AppConfig;
use contextweave_registry::{SopResolver, sop_ref_label};

pub fn run(config: &AppConfig, reference: &str) -> anyhow::Result<()> {
    let resolver = SopResolver::new(config.resolve_sop_root(), config.sop.max_bytes);
    let content = resolver
        .resolve_ref(reference)
        .with_context(|| format!("Failed to resolve '{reference}'"))?;

    println!("SOP [{}]", sop_ref_label(reference));
    println!("  Root: {}", resolver.repo_root().display());
    println!();
    if content.is_empty() {
        println!("(no content: file not found or empty)");
    } else {
        println!("{content}");
    }
    Ok(())
}
