use binlog_distributor::event::{ChangeEvent, RowChange, RowImage, UpdateRow};
use binlog_distributor::publisher::{MemoryPublisher, PublisherRegistry};
use binlog_distributor::{Backend, Distributor};
use serde_json::Value;
use std::sync::Arc;

pub struct Harness {
    pub redis: Arc<MemoryPublisher>,
    pub exchange: Arc<MemoryPublisher>,
    pub stream: Arc<MemoryPublisher>,
    pub distributor: Distributor,
}

/// A distributor with an in-memory publisher behind each known backend.
pub fn harness() -> Harness {
    harness_with(MemoryPublisher::new())
}

/// Like [`harness`], with a custom publisher for the redis backend.
pub fn harness_with(redis: MemoryPublisher) -> Harness {
    let redis = Arc::new(redis);
    let exchange = Arc::new(MemoryPublisher::new());
    let stream = Arc::new(MemoryPublisher::new());

    let publishers = PublisherRegistry::new()
        .with(Backend::Redis, redis.clone())
        .with(Backend::Exchange, exchange.clone())
        .with(Backend::Stream, stream.clone());

    Harness {
        redis,
        exchange,
        stream,
        distributor: Distributor::new(publishers),
    }
}

pub fn row(value: Value) -> RowImage {
    value
        .as_object()
        .cloned()
        .expect("row fixture must be a JSON object")
}

pub fn insert(rows: Vec<Value>) -> ChangeEvent {
    ChangeEvent::new(
        "shop",
        "orders",
        RowChange::Insert {
            rows: rows.into_iter().map(row).collect(),
        },
    )
}

pub fn delete(rows: Vec<Value>) -> ChangeEvent {
    ChangeEvent::new(
        "shop",
        "orders",
        RowChange::Delete {
            rows: rows.into_iter().map(row).collect(),
        },
    )
}

pub fn update(pairs: Vec<(Value, Value)>) -> ChangeEvent {
    ChangeEvent::new(
        "shop",
        "orders",
        RowChange::Update {
            rows: pairs
                .into_iter()
                .map(|(before, after)| UpdateRow {
                    before: row(before),
                    after: row(after),
                })
                .collect(),
        },
    )
}
