//! ContextWeave CLI: inspect the static context tree and exercise the
//! budgeting pipeline on a conversation file.
//!
//! Commands:
//! - `snapshot`: Load the static context registry and show its version
//! - `budget`: Classify a conversation against a token limit and compact it
//! - `rank`: Show message priorities and a budgeted selection
//! - `sop`: Resolve a `path#anchor` SOP reference
//! - `config`: Print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "contextweave",
    about = "ContextWeave: context budgeting for LLM agents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.contextweave/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the static context tree and print its version and entry counts
    Snapshot {
        /// Override the context root
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Check a conversation (JSON array of messages) against a token limit
    Budget {
        /// Conversation file
        file: PathBuf,

        /// Token limit (defaults to context.token_limit)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Also run the priority trimmer down to this many tokens
        #[arg(long)]
        trim_to: Option<usize>,

        /// Also trim until the input cost (USD) fits; needs --model
        #[arg(long, requires = "model")]
        max_cost: Option<f64>,

        /// Model used for cost estimates
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Rank a conversation's messages
    Rank {
        /// Conversation file
        file: PathBuf,

        /// Select the best messages that fit in this many tokens
        #[arg(short, long)]
        budget: Option<usize>,
    },

    /// Resolve an SOP reference such as `docs/runbook.md#deploy`
    Sop {
        reference: String,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Snapshot { root } => commands::snapshot::run(&config, root).await?,
        Commands::Budget {
            file,
            limit,
            trim_to,
            max_cost,
            model,
        } => commands::budget::run(&config, &file, limit, trim_to, max_cost, model.as_deref())?,
        Commands::Rank { file, budget } => commands::rank::run(&file, budget)?,
        Commands::Sop { reference } => commands::sop::run(&config, &reference)?,
        Commands::Config => commands::config_cmd::run(&config)?,
    }

    Ok(())
}
