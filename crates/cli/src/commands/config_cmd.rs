//! `contextweave config`: Print the effective configuration.

use anyhow::Context;
use contextweave_config::AppConfig;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    let rendered = toml::to_string_pretty(config).context("Failed to render config")?;
    println!("# Config file: {}", AppConfig::config_dir().join("config.toml").display());
    println!("# Context root: {}", config.resolve_context_root().display());
    println!("# SOP root: {}", config.resolve_sop_root().display());
    println!();
    print!("{rendered}");
    Ok(())
}
