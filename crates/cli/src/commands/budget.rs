//! `contextweave budget`: Classify and compact a conversation.

use super::read_conversation;
use anyhow::bail;
use contextweave_budget::{
    BudgetAction, CompactionEngine, ModelCostProfile, TrimConfig, budget_check,
    default_model_profiles, estimate_input_cost, estimate_messages_tokens, trim_messages,
};
use contextweave_config::AppConfig;
use contextweave_core::MessageSource;
use std::path::Path;

pub fn run(
    config: &AppConfig,
    file: &Path,
    limit: Option<usize>,
    trim_to: Option<usize>,
    max_cost: Option<f64>,
    model: Option<&str>,
) -> anyhow::Result<()> {
    let messages = read_conversation(file)?;
    let ctx = &config.context;
    let limit = limit.unwrap_or(ctx.token_limit);

    let profiles = default_model_profiles();
    let profile = match model {
        Some(name) => match profiles.get(name) {
            Some(profile) => Some(profile.clone()),
            None => bail!(
                "Unknown model '{name}'. Known models: {}",
                profiles.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
        },
        None => None,
    };
    if let Some(max_cost) = max_cost {
        if profile.is_none() {
            bail!("--max-cost needs --model to price tokens");
        }
        if max_cost <= 0.0 {
            bail!("--max-cost must be positive, got {max_cost}");
        }
    }

    let tokens = estimate_messages_tokens(&messages);
    let action = budget_check(tokens, limit, ctx.compression_threshold, ctx.aggressive_threshold);

    println!("Budget Check");
    println!("============");
    println!("  Messages:   {}", messages.len());
    println!("  Tokens:     {tokens}");
    println!("  Limit:      {limit}");
    if limit > 0 {
        println!("  Usage:      {:.1}%", tokens as f64 / limit as f64 * 100.0);
    }
    if let Some(profile) = &profile {
        println!(
            "  Input cost: ${:.6} ({})",
            estimate_input_cost(tokens, Some(profile)),
            profile.name
        );
    }
    println!("  Action:     {action}");

    let engine = CompactionEngine::new().with_threshold(ctx.compression_threshold);
    match action {
        BudgetAction::Ok => {}
        BudgetAction::Compress => {
            let (compacted, applied) = engine.auto_compact(&messages, limit);
            println!();
            if applied {
                println!(
                    "  Compacted:  {} -> {} message(s), {} tokens",
                    messages.len(),
                    compacted.len(),
                    estimate_messages_tokens(&compacted)
                );
            } else {
                println!("  Compaction not applied");
            }
        }
        BudgetAction::AggressiveTrim => {
            let trimmed = engine.aggressive_trim(&messages, ctx.aggressive_max_turns);
            println!();
            println!(
                "  Aggressive trim: {} -> {} message(s) (last {} turns), {} tokens",
                messages.len(),
                trimmed.len(),
                ctx.aggressive_max_turns,
                estimate_messages_tokens(&trimmed)
            );
        }
    }

    // A cost ceiling alone trims against the token limit.
    let trim_tokens = trim_to.or_else(|| max_cost.map(|_| limit));
    if let Some(max_tokens) = trim_tokens {
        let config = trim_config(max_tokens, max_cost, profile);
        let result = trim_messages(&messages, &config);
        println!();
        match max_cost {
            Some(cost) => println!("Priority Trim (max {max_tokens} tokens, max ${cost:.6})"),
            None => println!("Priority Trim (max {max_tokens} tokens)"),
        }
        println!(
            "  Kept:       {} message(s), {} tokens",
            result.kept.len(),
            result.total_tokens
        );
        println!("  Trimmed:    {} message(s)", result.trimmed.len());
        for msg in &result.trimmed {
            println!("    - {} ({})", msg.source.as_str(), msg.id);
        }
        if result.estimated_cost_usd > 0.0 {
            println!("  Est. cost:  ${:.6}", result.estimated_cost_usd);
        }
    }
    Ok(())
}

/// Trimmer settings for the CLI. The system prompt is never evicted; a zero
/// token ceiling means no token limit.
fn trim_config(
    max_tokens: usize,
    max_cost_usd: Option<f64>,
    model: Option<ModelCostProfile>,
) -> TrimConfig {
    TrimConfig {
        max_tokens: if max_tokens == 0 { usize::MAX } else { max_tokens },
        max_cost_usd: max_cost_usd.unwrap_or_default(),
        preserved_sources: vec![MessageSource::SystemPrompt],
        model,
    }
}
