//! Feeds change events from a line-delimited JSON stream into the
//! distributor.

use crate::distributor::Distributor;
use crate::event::ChangeEvent;
use crate::subscription::SubscriptionSet;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// Totals for one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub events: u64,
    pub skipped: u64,
}

pub struct Ingestor {
    distributor: Arc<Distributor>,
    subscriptions: SubscriptionSet,
}

impl Ingestor {
    pub fn new(distributor: Arc<Distributor>, subscriptions: SubscriptionSet) -> Self {
        Self {
            distributor,
            subscriptions,
        }
    }

    /// Distributes every event read from `input` until EOF.
    ///
    /// Lines that are blank or fail to parse are logged and skipped.
    pub async fn run<R>(&self, input: R) -> Result<IngestStats>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = LinesStream::new(input.lines());
        let mut stats = IngestStats::default();

        while let Some(line) = lines.next().await {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let event: ChangeEvent = match serde_json::from_str(&line) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed change event");
                    stats.skipped += 1;
                    continue;
                }
            };

            let subscriptions = self.subscriptions.for_event(&event);
            debug!(
                table_key = %event.table_key(),
                kind = event.kind(),
                rows = event.row_count(),
                subscriptions = subscriptions.len(),
                "Distributing change event"
            );
            self.distributor.distribute(subscriptions, &event).await;
            stats.events += 1;
        }

        info!(
            events = stats.events,
            skipped = stats.skipped,
            published = self.distributor.total_published(),
            "Input exhausted"
        );
        Ok(stats)
    }
}

/// Periodically logs how many subscriptions were served since the last tick.
///
/// This is the only sampler of the distributor's checkpoint while it runs.
pub fn spawn_throughput_reporter(distributor: Arc<Distributor>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let delta = distributor.published_since_last_sample();
            info!(
                published = delta,
                total = distributor.total_published(),
                interval_secs = interval.as_secs(),
                "Publish throughput"
            );
        }
    })
}
