//! Recipient commands: the only operations the routing layer may invoke.
//!
//! [`CommandHandler`] owns the pipeline components and the scheduler, turns a
//! [`RecipientCommand`] into outgoing messages and hands them to the
//! transport. Every command produces at least one message.

use crate::api::AskAsync;
use crate::config::Settings;
use crate::error::PipelineError;
use crate::fetch::PageFetcher;
use crate::models::{OutgoingMessage, RecipientId};
use crate::outputs::Transport;
use crate::outputs::messages::{
    self, CANCELLED, HELP, INVALID_INTERVAL, NO_NEWS, RESET, WELCOME,
};
use crate::scheduler::{DeliveryInterval, NotificationScheduler, PriceDelivery};
use crate::scrapers::article::ArticleEnricher;
use crate::scrapers::headlines::HeadlineCollector;
use crate::scrapers::prices::PriceQuoteFetcher;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", content = "arg", rename_all = "snake_case")]
pub enum RecipientCommand {
    Start,
    /// Current prices, right now.
    FetchPrices,
    /// Show the interval menu.
    ChooseInterval,
    /// Menu code (`5m`, `1h`, `3h`, `6h`) or a number of seconds.
    SelectInterval(String),
    /// Report the recipient's current recurring delivery.
    Status,
    CancelAll,
    /// Headline source key, e.g. `tech`.
    CollectHeadlines(String),
    /// Cancel everything and greet again.
    Reset,
    Help,
}

/// A command addressed to one recipient, as read off the wire.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandRequest {
    pub recipient: RecipientId,
    #[serde(flatten)]
    pub command: RecipientCommand,
}

/// Interval requests accept a menu code or a plain number of seconds; the
/// scheduler decides whether the number is on the menu.
fn requested_seconds(arg: &str) -> Result<u64, PipelineError> {
    if let Ok(interval) = arg.parse::<DeliveryInterval>() {
        return Ok(interval.seconds());
    }
    arg.trim()
        .parse::<u64>()
        .map_err(|_| PipelineError::InvalidInput(format!("unsupported interval {arg:?}")))
}

pub struct CommandHandler<F, S, T> {
    quotes: Arc<PriceQuoteFetcher<F>>,
    collector: HeadlineCollector<F>,
    enricher: ArticleEnricher<F, S>,
    scheduler: NotificationScheduler<PriceDelivery<F, T>>,
    transport: Arc<T>,
    settings: Settings,
}

impl<F, S, T> CommandHandler<F, S, T>
where
    F: PageFetcher + 'static,
    S: AskAsync,
    T: Transport,
{
    pub fn new(
        settings: Settings,
        fetcher: Arc<F>,
        summarizer: Arc<S>,
        transport: Arc<T>,
    ) -> Result<Self, PipelineError> {
        let quotes = Arc::new(PriceQuoteFetcher::new(
            Arc::clone(&fetcher),
            settings.fiat.clone(),
            settings.stablecoin.clone(),
        )?);
        let delivery = PriceDelivery::new(Arc::clone(&quotes), Arc::clone(&transport));
        Ok(Self {
            collector: HeadlineCollector::new(Arc::clone(&fetcher)),
            enricher: ArticleEnricher::new(fetcher, summarizer, settings.summarizer.clone()),
            scheduler: NotificationScheduler::new(
                Arc::new(delivery),
                settings.scheduler.initial_delay(),
            ),
            quotes,
            transport,
            settings,
        })
    }

    pub fn scheduler(&self) -> &NotificationScheduler<PriceDelivery<F, T>> {
        &self.scheduler
    }

    /// Run `command` for `recipient` and deliver the resulting messages.
    ///
    /// Delivery failures are logged, not returned; a photo that cannot be
    /// delivered is resent as plain text so the item is not lost. The only
    /// error is [`PipelineError::InvalidInput`], returned after the recipient
    /// has been told.
    #[instrument(level = "info", skip(self))]
    pub async fn handle(
        &self,
        recipient: RecipientId,
        command: RecipientCommand,
    ) -> Result<(), PipelineError> {
        let (messages, outcome) = match self.respond(recipient, command).await {
            Ok(messages) => (messages, Ok(())),
            Err(Rejection { error, reply }) => {
                warn!(error = %error, "Rejected command");
                (vec![OutgoingMessage::text(reply)], Err(error))
            }
        };

        for message in &messages {
            self.deliver(recipient, message).await;
        }
        outcome
    }

    async fn deliver(&self, recipient: RecipientId, message: &OutgoingMessage) {
        let Err(e) = self.transport.deliver(recipient, message).await else {
            return;
        };
        if message.image_url.is_none() {
            warn!(error = %e, "Delivery failed");
            return;
        }

        warn!(error = %e, "Photo delivery failed; resending as text");
        let fallback = OutgoingMessage::text(message.text.clone());
        if let Err(e) = self.transport.deliver(recipient, &fallback).await {
            warn!(error = %e, "Delivery failed");
        }
    }

    async fn respond(
        &self,
        recipient: RecipientId,
        command: RecipientCommand,
    ) -> Result<Vec<OutgoingMessage>, Rejection> {
        let messages = match command {
            RecipientCommand::Start => vec![OutgoingMessage::text(WELCOME)],
            RecipientCommand::Help => vec![OutgoingMessage::text(HELP)],
            RecipientCommand::ChooseInterval => vec![messages::interval_menu()],
            RecipientCommand::FetchPrices => {
                let (fiat, stablecoin) = self.quotes.fetch_quotes().await;
                info!(
                    fiat = fiat.is_price(),
                    stablecoin = stablecoin.is_price(),
                    "Fetched quotes"
                );
                vec![messages::price_message(&fiat, &stablecoin, Utc::now())]
            }
            RecipientCommand::SelectInterval(arg) => {
                let interval = self
                    .select_interval(recipient, &arg)
                    .map_err(|error| Rejection::new(error, INVALID_INTERVAL))?;
                vec![messages::interval_confirmation(interval)]
            }
            RecipientCommand::Status => {
                let job = self.scheduler.job(recipient);
                debug!(active = self.scheduler.active_jobs(recipient), "Schedule status");
                vec![messages::schedule_status(job.as_ref())]
            }
            RecipientCommand::CancelAll => {
                self.scheduler.cancel_all(recipient);
                vec![OutgoingMessage::text(CANCELLED)]
            }
            RecipientCommand::Reset => {
                self.scheduler.cancel_all(recipient);
                vec![OutgoingMessage::text(RESET)]
            }
            RecipientCommand::CollectHeadlines(key) => self
                .news_section(&key)
                .await
                .map_err(|error| Rejection::new(error, NO_NEWS))?,
        };
        Ok(messages)
    }

    fn select_interval(
        &self,
        recipient: RecipientId,
        arg: &str,
    ) -> Result<DeliveryInterval, PipelineError> {
        let job = self.scheduler.schedule(recipient, requested_seconds(arg)?)?;
        DeliveryInterval::from_seconds(job.interval_seconds)
    }

    #[instrument(level = "info", skip(self))]
    async fn news_section(&self, key: &str) -> Result<Vec<OutgoingMessage>, PipelineError> {
        let headlines_settings = &self.settings.headlines;
        let source = headlines_settings.source(key)?;

        let headlines = self.collector.collect(source, headlines_settings.limit).await;
        let articles = self
            .enricher
            .enrich_all(headlines.clone(), headlines_settings.parallelism)
            .await;
        info!(
            headlines = headlines.len(),
            enriched = articles.len(),
            with_image = articles.iter().filter(|a| a.image_url.is_some()).count(),
            summarized = articles.iter().filter(|a| a.summary.is_genuine()).count(),
            "Built news section"
        );
        Ok(messages::news_messages(source, &headlines, &articles))
    }
}

/// A refused command and the reply the recipient gets for it.
struct Rejection {
    error: PipelineError,
    reply: &'static str,
}

impl Rejection {
    fn new(error: PipelineError, reply: &'static str) -> Self {
        Self { error, reply }
    }
}
