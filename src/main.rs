//! # Market Digest
//!
//! Scrapes the current dollar and tether prices and per-category news
//! headlines from Persian-language sites, enriches headlines with a lead image
//! and a short LLM summary, and delivers the result to recipients either on
//! demand or on a recurring schedule.
//!
//! ## Usage
//!
//! ```sh
//! market_digest prices
//! market_digest headlines economy
//! echo '{"recipient": 1, "command": "select_interval", "arg": "1h"}' | market_digest serve
//! ```
//!
//! ## Architecture
//!
//! 1. **Prices**: fiat and stablecoin pages are fetched concurrently and
//!    reduced to a [`models::PriceQuote`] each, never an error
//! 2. **Headlines**: a listing page is filtered down to editorial links
//! 3. **Enrichment**: every headline gets an image and a summary, bounded
//!    parallelism, each step failing soft into a sentinel
//! 4. **Delivery**: messages go out through a [`outputs::Transport`]; the
//!    scheduler re-delivers prices per recipient at a fixed interval

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod commands;
mod config;
mod error;
mod fetch;
mod models;
mod outputs;
mod scheduler;
mod scrapers;
#[cfg(test)]
mod testing;
mod utils;

use api::{ChatCompletionClient, RetryAsk};
use cli::{Cli, Command};
use commands::{CommandHandler, CommandRequest, RecipientCommand};
use config::Settings;
use fetch::HttpFetcher;
use outputs::json::JsonLinesTransport;
use utils::truncate_for_log;

type Handler = CommandHandler<HttpFetcher, RetryAsk<ChatCompletionClient>, JsonLinesTransport>;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    // stdout carries the delivered messages, so logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("market_digest starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.command, "Parsed CLI arguments");

    let settings = match &args.config {
        Some(path) => Settings::load(path).await?,
        None => Settings::default(),
    };

    let api_key = args.api_key.clone().unwrap_or_default();
    if api_key.is_empty() {
        warn!("No summarizer API key; summaries will be unavailable");
    }
    let client = ChatCompletionClient::new(&settings.summarizer, api_key)?;
    let summarizer = RetryAsk::new(
        client,
        settings.summarizer.max_retries,
        Duration::from_secs(1),
    );
    let fetcher = HttpFetcher::new(settings.http.timeout())?;
    let transport = Arc::new(JsonLinesTransport::stdout());

    let handler = Arc::new(CommandHandler::new(
        settings,
        Arc::new(fetcher),
        Arc::new(summarizer),
        transport,
    )?);

    match args.command {
        Command::Prices => {
            handler
                .handle(args.recipient, RecipientCommand::FetchPrices)
                .await?
        }
        Command::Headlines { source } => {
            handler
                .handle(args.recipient, RecipientCommand::CollectHeadlines(source))
                .await?
        }
        Command::Serve => serve(handler).await?,
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// Read one [`CommandRequest`] per stdin line until EOF, then keep the
/// scheduler alive until Ctrl-C if any job is still armed.
async fn serve(handler: Arc<Handler>) -> Result<(), Box<dyn Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight = JoinSet::new();
    info!("Serving commands from stdin");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let request: CommandRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, line = %truncate_for_log(line, 200), "Ignoring malformed command");
                continue;
            }
        };

        let handler = Arc::clone(&handler);
        in_flight.spawn(async move {
            let CommandRequest { recipient, command } = request;
            if let Err(e) = handler.handle(recipient, command).await {
                debug!(recipient, error = %e, "Command rejected");
            }
        });
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Command task panicked");
        }
    }

    if handler.scheduler().is_empty() {
        info!("Input closed and no jobs armed; exiting");
        return Ok(());
    }

    info!(jobs = handler.scheduler().len(), "Input closed; waiting for Ctrl-C");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Could not listen for Ctrl-C");
    }
    Ok(())
}
