//! `contextweave snapshot`: Load the static context tree.

use anyhow::Context;
use contextweave_config::AppConfig;
use contextweave_registry::{SopResolver, StaticRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub async fn run(config: &AppConfig, root: Option<PathBuf>) -> anyhow::Result<()> {
    let root = root.unwrap_or_else(|| config.resolve_context_root());
    let registry = StaticRegistry::new(&root)
        .with_ttl(Duration::from_secs(config.context.ttl_secs))
        .with_sop_resolver(Arc::new(SopResolver::new(
            config.resolve_sop_root(),
            config.sop.max_bytes,
        )));

    let snapshot = registry
        .current_snapshot()
        .await
        .with_context(|| format!("Failed to load static context from {}", root.display()))?;

    println!("Static Context");
    println!("==============");
    println!("  Root:       {}", root.display());
    println!("  Version:    {}", snapshot.version);
    println!("  Loaded at:  {}", snapshot.loaded_at.to_rfc3339());
    println!("  TTL:        {}s", registry.ttl().as_secs());
    println!();
    print_keys("Personas", snapshot.personas.keys());
    print_keys("Goals", snapshot.goals.keys());
    print_keys("Policies", snapshot.policies.keys());
    print_keys("Knowledge", snapshot.knowledge.keys());
    print_keys("Worlds", snapshot.worlds.keys());

    let resolved: usize = snapshot
        .knowledge
        .values()
        .map(|k| k.resolved_sop_content.len())
        .sum();
    if resolved > 0 {
        println!();
        println!("  {resolved} SOP reference(s) resolved");
    }
    Ok(())
}

fn print_keys<'a>(label: &str, keys: impl ExactSizeIterator<Item = &'a String>) {
    let count = keys.len();
    let names: Vec<&str> = keys.map(String::as_str).collect();
    println!("  {:<11} {:>3}  {}", format!("{label}:"), count, names.join(", "));
}
