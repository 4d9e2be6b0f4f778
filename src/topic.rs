//! Topic naming for distributed change events.
//!
//! Names are wire-visible: existing consumers subscribe to them by string,
//! so the format must not change.

use crate::event::RowImage;
use crate::subscription::Subscription;
use serde_json::Value;

/// Namespace prefix shared by every topic the distributor publishes to.
pub const TOPIC_PREFIX: &str = "BIN-LOG-DATA-";

/// Suffix used when the tracked column is absent or null in a row.
pub const NULL_VALUE: &str = "NULL";

/// Coarse topic for a subscription: `BIN-LOG-DATA-<table_key>`.
///
/// Also the stem of every column-level topic for that subscription.
pub fn topic_name(subscription: &Subscription) -> String {
    format!("{}{}", TOPIC_PREFIX, subscription.table_key())
}

/// Column-level topic: the coarse topic immediately followed by the value.
pub fn column_topic_name(subscription: &Subscription, value: &str) -> String {
    let mut topic = topic_name(subscription);
    topic.push_str(value);
    topic
}

/// String form of `column` in `row`, or `NULL` when it is missing or null.
pub fn column_value(row: &RowImage, column: &str) -> String {
    match row.get(column) {
        None | Some(Value::Null) => NULL_VALUE.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}
