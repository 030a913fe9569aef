//! Command-line interface definitions for Market Digest.
//!
//! Every subcommand goes through the same command handler the `serve` loop
//! uses, so a one-shot run and a long-lived service behave identically.

use clap::{Parser, Subcommand};

/// Command-line arguments for Market Digest.
///
/// # Examples
///
/// ```sh
/// # Current dollar and tether prices, as one JSON line on stdout
/// market_digest prices
///
/// # Technology headlines with images and summaries
/// GROQ_API_KEY=... market_digest headlines tech
///
/// # Long-lived: read JSON-lines commands from stdin
/// market_digest --config ./config.yaml serve
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<String>,

    /// API key for the chat-completion summarizer
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Recipient id stamped on one-shot output
    #[arg(short, long, default_value_t = 0)]
    pub recipient: i64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fetch current prices once
    Prices,
    /// Collect, enrich and print one news section
    Headlines {
        /// Source key: economy, tech or entertainment
        source: String,
    },
    /// Read recipient commands as JSON lines from stdin and run the scheduler
    Serve,
}
