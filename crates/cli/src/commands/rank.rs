//! `contextweave rank`: Show message priorities.

use super::read_conversation;
use contextweave_budget::token::estimate_message_tokens;
use contextweave_budget::{MessageRanker, select_top_n};
use std::path::Path;

pub fn run(file: &Path, budget: Option<usize>) -> anyhow::Result<()> {
    let messages = read_conversation(file)?;
    let ranked = MessageRanker::default().rank_messages(&messages);

    println!("{:>4}  {:<16} {:>8} {:>7}  Reason", "#", "Source", "Priority", "Tokens");
    for entry in &ranked {
        println!(
            "{:>4}  {:<16} {:>8.3} {:>7}  {}",
            entry.index,
            entry.message.source.as_str(),
            entry.priority,
            estimate_message_tokens(&entry.message),
            entry.reason
        );
    }

    if let Some(budget) = budget {
        let selected = select_top_n(&ranked, budget, estimate_message_tokens);
        let used: usize = selected
            .iter()
            .map(|r| estimate_message_tokens(&r.message))
            .sum();
        let indices: Vec<String> = selected.iter().map(|r| r.index.to_string()).collect();
        println!();
        println!(
            "Selected {} of {} message(s) in {used}/{budget} tokens: [{}]",
            selected.len(),
            ranked.len(),
            indices.join(", ")
        );
    }
    Ok(())
}
