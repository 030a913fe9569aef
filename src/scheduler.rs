//! Recurring per-recipient price delivery.
//!
//! Each recipient has at most one job, named `price_<recipient>`. Jobs are
//! never edited in place: choosing a new interval cancels the old job and
//! arms a fresh one while the registry lock is held, so two jobs for the same
//! recipient never overlap.
//!
//! Cancellation is cooperative. A cancelled job is simply not re-armed; a
//! firing that is already running is allowed to finish.

use crate::error::PipelineError;
use crate::fetch::PageFetcher;
use crate::models::RecipientId;
use crate::outputs::Transport;
use crate::outputs::messages::price_message;
use crate::scrapers::prices::PriceQuoteFetcher;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, instrument, warn};

/// The fixed menu of delivery periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeliveryInterval {
    FiveMinutes,
    OneHour,
    ThreeHours,
    SixHours,
}

impl DeliveryInterval {
    pub const ALL: [DeliveryInterval; 4] = [
        DeliveryInterval::FiveMinutes,
        DeliveryInterval::OneHour,
        DeliveryInterval::ThreeHours,
        DeliveryInterval::SixHours,
    ];

    pub fn seconds(self) -> u64 {
        match self {
            DeliveryInterval::FiveMinutes => 300,
            DeliveryInterval::OneHour => 3_600,
            DeliveryInterval::ThreeHours => 10_800,
            DeliveryInterval::SixHours => 21_600,
        }
    }

    pub fn period(self) -> Duration {
        Duration::from_secs(self.seconds())
    }

    /// Menu code, e.g. `5m`.
    pub fn code(self) -> &'static str {
        match self {
            DeliveryInterval::FiveMinutes => "5m",
            DeliveryInterval::OneHour => "1h",
            DeliveryInterval::ThreeHours => "3h",
            DeliveryInterval::SixHours => "6h",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DeliveryInterval::FiveMinutes => "۵ دقیقه",
            DeliveryInterval::OneHour => "۱ ساعت",
            DeliveryInterval::ThreeHours => "۳ ساعت",
            DeliveryInterval::SixHours => "۶ ساعت",
        }
    }

    pub fn from_seconds(seconds: u64) -> Result<Self, PipelineError> {
        Self::ALL
            .into_iter()
            .find(|i| i.seconds() == seconds)
            .ok_or_else(|| PipelineError::InvalidInput(format!("unsupported interval {seconds}s")))
    }
}

impl FromStr for DeliveryInterval {
    type Err = PipelineError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|i| i.code() == code.trim())
            .ok_or_else(|| PipelineError::InvalidInput(format!("unsupported interval {code:?}")))
    }
}

/// Job name for a recipient. Depends on nothing but the recipient id.
pub fn job_name(recipient: RecipientId) -> String {
    format!("price_{recipient}")
}

/// Work done each time a job fires.
pub trait FireJob: Send + Sync + 'static {
    fn fire(&self, recipient: RecipientId) -> impl Future<Output = ()> + Send;
}

/// Snapshot of an active job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledJob {
    pub recipient_id: RecipientId,
    pub interval_seconds: u64,
    pub name: String,
    pub next_fire_at: DateTime<Utc>,
}

struct JobHandle {
    recipient: RecipientId,
    interval: DeliveryInterval,
    armed_at: DateTime<Utc>,
    initial_delay: Duration,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl JobHandle {
    fn snapshot(&self, name: &str, now: DateTime<Utc>) -> ScheduledJob {
        ScheduledJob {
            recipient_id: self.recipient,
            interval_seconds: self.interval.seconds(),
            name: name.to_string(),
            next_fire_at: self.next_fire_at(now),
        }
    }

    fn next_fire_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let first = self.armed_at
            + chrono::Duration::from_std(self.initial_delay).unwrap_or_default();
        if now <= first {
            return first;
        }
        let period = self.interval.seconds() as i64;
        let elapsed = (now - first).num_seconds();
        let ticks = (elapsed + period - 1) / period;
        first + chrono::Duration::seconds(ticks * period)
    }

    fn cancel(self) {
        // Only wakes the task if it is idle between firings.
        let _ = self.cancel.send(true);
        drop(self.task);
    }
}

pub struct NotificationScheduler<J> {
    job: Arc<J>,
    initial_delay: Duration,
    registry: Mutex<HashMap<String, JobHandle>>,
}

impl<J: FireJob> NotificationScheduler<J> {
    pub fn new(job: Arc<J>, initial_delay: Duration) -> Self {
        Self {
            job,
            initial_delay,
            registry: Mutex::new(HashMap::new()),
        }
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<String, JobHandle>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace whatever job `recipient` has with one firing every
    /// `interval_seconds`.
    ///
    /// Intervals outside the menu are rejected with
    /// [`PipelineError::InvalidInput`] and leave the existing job untouched.
    /// Must be called from within a Tokio runtime.
    #[instrument(level = "info", skip(self))]
    pub fn schedule(
        &self,
        recipient: RecipientId,
        interval_seconds: u64,
    ) -> Result<ScheduledJob, PipelineError> {
        let interval = DeliveryInterval::from_seconds(interval_seconds).inspect_err(|e| {
            warn!(error = %e, "Rejected schedule request");
        })?;
        let name = job_name(recipient);

        let mut registry = self.registry();
        if let Some(previous) = registry.remove(&name) {
            debug!(previous = previous.interval.seconds(), "Replacing existing job");
            previous.cancel();
        }

        let (cancel, cancelled) = watch::channel(false);
        let task = tokio::spawn(run_job(
            Arc::clone(&self.job),
            recipient,
            self.initial_delay,
            interval.period(),
            cancelled,
        ));
        let handle = JobHandle {
            recipient,
            interval,
            armed_at: Utc::now(),
            initial_delay: self.initial_delay,
            cancel,
            task,
        };
        let snapshot = handle.snapshot(&name, handle.armed_at);
        registry.insert(name, handle);

        info!(
            interval = interval.code(),
            next_fire_at = %snapshot.next_fire_at,
            "Scheduled price delivery"
        );
        Ok(snapshot)
    }

    /// Remove every job named for `recipient`. Returns how many were removed;
    /// zero is not an error.
    #[instrument(level = "info", skip(self))]
    pub fn cancel_all(&self, recipient: RecipientId) -> usize {
        let name = job_name(recipient);
        let removed: Vec<JobHandle> = {
            let mut registry = self.registry();
            registry.remove(&name).into_iter().collect()
        };
        let count = removed.len();
        removed.into_iter().for_each(JobHandle::cancel);
        info!(count, "Cancelled price delivery");
        count
    }

    /// Snapshot of the job currently armed for `recipient`.
    ///
    /// # Arguments
    ///
    /// * `recipient` - Recipient whose `price_<id>` job to look up
    ///
    /// # Returns
    ///
    /// `None` when the recipient has no job; otherwise its interval and the
    /// next firing time computed from the arming time and the initial delay.
    ///
    /// # Example
    ///
    /// ```ignore
    /// scheduler.schedule(42, 3_600)?;
    /// assert_eq!(scheduler.job(42).unwrap().name, "price_42");
    /// ```
    pub fn job(&self, recipient: RecipientId) -> Option<ScheduledJob> {
        let name = job_name(recipient);
        self.registry()
            .get(&name)
            .map(|h| h.snapshot(&name, Utc::now()))
    }

    /// Number of jobs named for `recipient`.
    ///
    /// # Arguments
    ///
    /// * `recipient` - Recipient to count jobs for
    ///
    /// # Returns
    ///
    /// Zero or one: replacement under the registry lock never lets two jobs
    /// for the same recipient coexist.
    pub fn active_jobs(&self, recipient: RecipientId) -> usize {
        usize::from(self.registry().contains_key(&job_name(recipient)))
    }

    /// Total jobs across all recipients.
    pub fn len(&self) -> usize {
        self.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn run_job<J: FireJob>(
    job: Arc<J>,
    recipient: RecipientId,
    initial_delay: Duration,
    period: Duration,
    mut cancelled: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + initial_delay, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancelled.changed() => break,
            _ = ticker.tick() => {}
        }
        if *cancelled.borrow() {
            break;
        }
        job.fire(recipient).await;
    }
    debug!(recipient, "Job stopped");
}

/// Fetches quotes and hands the formatted message to the transport.
pub struct PriceDelivery<F, T> {
    quotes: Arc<PriceQuoteFetcher<F>>,
    transport: Arc<T>,
}

impl<F, T> PriceDelivery<F, T> {
    pub fn new(quotes: Arc<PriceQuoteFetcher<F>>, transport: Arc<T>) -> Self {
        Self { quotes, transport }
    }
}

impl<F, T> FireJob for PriceDelivery<F, T>
where
    F: PageFetcher + 'static,
    T: Transport,
{
    #[instrument(level = "info", skip(self))]
    async fn fire(&self, recipient: RecipientId) {
        let (fiat, stablecoin) = self.quotes.fetch_quotes().await;
        let message = price_message(&fiat, &stablecoin, Utc::now());
        if let Err(e) = self.transport.deliver(recipient, &message).await {
            error!(error = %e, "Scheduled delivery failed; job stays armed");
        }
    }
}
