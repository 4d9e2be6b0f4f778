//! Routing and fan-out of change events to subscribers.
//!
//! For every subscription interested in an event the [`Distributor`]
//! computes the messages the event turns into, picks the publisher for the
//! subscription's backend and hands each message over.
//!
//! Database, table and row subscriptions receive the event unchanged on
//! their coarse topic. Column subscriptions receive one single-row event per row,
//! on a topic suffixed with that row's value of the tracked column. An
//! update that moves a row from one column value to another is never
//! delivered as an update: it becomes a delete on the old value's topic and
//! an insert on the new one.
//!
//! # Example
//!
//! ```rust
//! use binlog_distributor::event::{ChangeEvent, RowChange};
//! use binlog_distributor::publisher::{MemoryPublisher, PublisherRegistry};
//! use binlog_distributor::subscription::{Backend, Subscription};
//! use binlog_distributor::Distributor;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> binlog_distributor::Result<()> {
//! let redis = Arc::new(MemoryPublisher::new());
//! let distributor = Distributor::new(PublisherRegistry::new().with(Backend::Redis, redis.clone()));
//!
//! let subscription = Subscription::table("client-1", "orders", Backend::Redis)?;
//! let event = ChangeEvent::new("shop", "orders", RowChange::Insert { rows: vec![] });
//!
//! distributor.distribute([&subscription], &event).await;
//!
//! assert_eq!(redis.published()[0].topic, "BIN-LOG-DATA-orders");
//! assert_eq!(distributor.total_published(), 1);
//! # Ok(())
//! # }
//! ```

use crate::counters::PublishCounters;
use crate::event::{ChangeEvent, RowChange, RowImage, UpdateRow};
use crate::publisher::PublisherRegistry;
use crate::subscription::{Backend, Granularity, Subscription};
use crate::topic::{column_topic_name, column_value, topic_name};
use futures::future::join_all;
use std::borrow::Cow;
use tracing::{debug, warn};

/// One message bound for one backend topic.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedMessage<'a> {
    pub topic: String,
    pub event: Cow<'a, ChangeEvent>,
    pub backend: &'a Backend,
    pub client_id: &'a str,
}

/// A single-row slice of an event, keyed by the tracked column's value.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSlice {
    pub value: String,
    pub event: ChangeEvent,
}

/// Splits `event` into per-row slices keyed by `column`.
///
/// Row order is preserved. Returns `None` for events without row
/// semantics.
pub fn explode(event: &ChangeEvent, column: &str) -> Option<Vec<ColumnSlice>> {
    let slices: Vec<ColumnSlice> = match &event.change {
        RowChange::Insert { rows } => rows
            .iter()
            .map(|row| slice(column, row, event.single_insert(row.clone())))
            .collect(),
        RowChange::Delete { rows } => rows
            .iter()
            .map(|row| slice(column, row, event.single_delete(row.clone())))
            .collect(),
        RowChange::Update { rows } => rows
            .iter()
            .flat_map(|row| explode_update(event, column, row))
            .collect(),
        RowChange::Unsupported => return None,
    };
    Some(slices)
}

fn slice(column: &str, row: &RowImage, event: ChangeEvent) -> ColumnSlice {
    ColumnSlice {
        value: column_value(row, column),
        event,
    }
}

fn explode_update(event: &ChangeEvent, column: &str, row: &UpdateRow) -> Vec<ColumnSlice> {
    let before = column_value(&row.before, column);
    let after = column_value(&row.after, column);

    if before == after {
        vec![ColumnSlice {
            value: before,
            event: event.single_update(row.clone()),
        }]
    } else {
        // The old partition loses the row, the new one gains it
        vec![
            ColumnSlice {
                value: before,
                event: event.single_delete(row.before.clone()),
            },
            ColumnSlice {
                value: after,
                event: event.single_insert(row.after.clone()),
            },
        ]
    }
}

/// Messages `event` turns into for `subscription`.
pub fn route<'a>(subscription: &'a Subscription, event: &'a ChangeEvent) -> Vec<RoutedMessage<'a>> {
    let message = move |topic: String, event: Cow<'a, ChangeEvent>| RoutedMessage {
        topic,
        event,
        backend: subscription.backend(),
        client_id: subscription.client_id(),
    };

    match subscription.granularity() {
        Granularity::Database | Granularity::Table | Granularity::Row => {
            vec![message(topic_name(subscription), Cow::Borrowed(event))]
        }
        Granularity::Column(column) => match explode(event, column) {
            Some(slices) => slices
                .into_iter()
                .map(|s| message(column_topic_name(subscription, &s.value), Cow::Owned(s.event)))
                .collect(),
            None => {
                warn!(
                    client_id = subscription.client_id(),
                    table_key = subscription.table_key(),
                    kind = event.kind(),
                    "Unsupported event kind for column routing, skipping"
                );
                Vec::new()
            }
        },
    }
}

/// Fans change events out to subscribers and counts subscriptions served.
#[derive(Debug)]
pub struct Distributor {
    publishers: PublisherRegistry,
    counters: PublishCounters,
}

impl Distributor {
    pub fn new(publishers: PublisherRegistry) -> Self {
        Self {
            publishers,
            counters: PublishCounters::new(),
        }
    }

    /// Routes `event` to every subscription and publishes the results.
    ///
    /// Subscriptions are served concurrently and independently: a missing
    /// publisher or a failing backend affects only its own subscription.
    pub async fn distribute<'a, I>(&self, subscriptions: I, event: &ChangeEvent)
    where
        I: IntoIterator<Item = &'a Subscription>,
    {
        join_all(
            subscriptions
                .into_iter()
                .map(|subscription| self.serve(subscription, event)),
        )
        .await;
    }

    async fn serve(&self, subscription: &Subscription, event: &ChangeEvent) {
        let messages = route(subscription, event);

        match self.publishers.get(subscription.backend()) {
            Some(publisher) => {
                for message in messages {
                    debug!(
                        topic = %message.topic,
                        client_id = message.client_id,
                        backend = %message.backend,
                        kind = message.event.kind(),
                        "Publishing"
                    );
                    if let Err(e) = publisher
                        .publish(message.client_id, &message.topic, &message.event)
                        .await
                    {
                        warn!(topic = %message.topic, error = %e, "Failed to publish message");
                    }
                }
            }
            None if messages.is_empty() => {}
            None => {
                warn!(
                    backend = %subscription.backend(),
                    client_id = subscription.client_id(),
                    table_key = subscription.table_key(),
                    dropped = messages.len(),
                    "No publisher for backend, messages not distributed"
                );
            }
        }

        self.counters.increment();
    }

    /// Deletes the coarse topic of every subscription.
    ///
    /// Returns how many deletions the backends confirmed. Column-level
    /// topics are not tracked and are left in place.
    pub async fn delete_subscription_topics(&self, subscriptions: &[Subscription]) -> usize {
        let mut success_count = 0;

        for subscription in subscriptions {
            let topic = topic_name(subscription);
            let Some(publisher) = self.publishers.get(subscription.backend()) else {
                warn!(
                    backend = %subscription.backend(),
                    topic = %topic,
                    "No publisher for backend, topic not deleted"
                );
                continue;
            };

            match publisher.delete_topic(&topic).await {
                Ok(()) => success_count += 1,
                Err(e) => warn!(topic = %topic, error = %e, "Failed to delete topic"),
            }
        }

        success_count
    }

    /// Subscriptions served since startup.
    pub fn total_published(&self) -> u64 {
        self.counters.total()
    }

    /// Subscriptions served since the previous call. Each call moves the
    /// sampling checkpoint.
    pub fn published_since_last_sample(&self) -> u64 {
        self.counters.since_last_sample()
    }
}
