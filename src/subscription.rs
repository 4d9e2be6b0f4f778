//! Subscriber routing rules.
//!
//! A [`Subscription`] says which table a client follows, how finely its
//! topics are partitioned and which backend carries the messages. The
//! tracked column exists exactly when the granularity is column-level; the
//! type makes any other combination unrepresentable, and records that
//! violate it are rejected when they are built or deserialized.
//!
//! Configuration lists go through [`deserialize_subscriptions`], which drops
//! records naming an unrecognized granularity instead of failing the load.

use crate::event::ChangeEvent;
use crate::{Error, Result};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// Message-queue technology a subscription publishes to.
///
/// Identifiers other than the known ones are kept verbatim so that the
/// distributor can report them; they only route if a publisher was
/// registered under the same identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Backend {
    Redis,
    Exchange,
    Stream,
    Other(String),
}

impl Backend {
    pub fn as_str(&self) -> &str {
        match self {
            Backend::Redis => "redis",
            Backend::Exchange => "exchange",
            Backend::Stream => "stream",
            Backend::Other(name) => name,
        }
    }
}

impl From<&str> for Backend {
    fn from(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "redis" => Backend::Redis,
            "exchange" | "rabbit" | "rabbitmq" => Backend::Exchange,
            "stream" | "kafka" => Backend::Stream,
            _ => Backend::Other(value.to_string()),
        }
    }
}

impl From<String> for Backend {
    fn from(value: String) -> Self {
        Backend::from(value.as_str())
    }
}

impl From<Backend> for String {
    fn from(value: Backend) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Granularity {
    /// Every table of the database named by the table key.
    Database,
    Table,
    Row,
    /// Topics are partitioned by the value of this column.
    Column(String),
}

impl Granularity {
    pub fn tracked_column(&self) -> Option<&str> {
        match self {
            Granularity::Column(column) => Some(column),
            Granularity::Database | Granularity::Table | Granularity::Row => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "SubscriptionRecord", into = "SubscriptionRecord")]
pub struct Subscription {
    client_id: String,
    table_key: String,
    backend: Backend,
    granularity: Granularity,
}

impl Subscription {
    pub fn new(
        client_id: impl Into<String>,
        table_key: impl Into<String>,
        backend: Backend,
        granularity: Granularity,
    ) -> Result<Self> {
        let table_key = table_key.into();
        if table_key.is_empty() {
            return Err(Error::InvalidSubscription {
                message: "table key must not be empty".to_string(),
            });
        }
        if let Granularity::Column(column) = &granularity {
            if column.is_empty() {
                return Err(Error::InvalidSubscription {
                    message: format!("column granularity on '{}' requires a column", table_key),
                });
            }
        }

        Ok(Self {
            client_id: client_id.into(),
            table_key,
            backend,
            granularity,
        })
    }

    pub fn table(
        client_id: impl Into<String>,
        table_key: impl Into<String>,
        backend: Backend,
    ) -> Result<Self> {
        Self::new(client_id, table_key, backend, Granularity::Table)
    }

    pub fn column(
        client_id: impl Into<String>,
        table_key: impl Into<String>,
        backend: Backend,
        column: impl Into<String>,
    ) -> Result<Self> {
        Self::new(client_id, table_key, backend, Granularity::Column(column.into()))
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn table_key(&self) -> &str {
        &self.table_key
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn granularity(&self) -> &Granularity {
        &self.granularity
    }
}

/// Granularity name as written in a subscription record.
///
/// Unrecognized names are kept so that they can be reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
enum GranularityLevel {
    Database,
    Table,
    Row,
    Column,
    Other(String),
}

impl From<String> for GranularityLevel {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "database" => GranularityLevel::Database,
            "table" => GranularityLevel::Table,
            "row" => GranularityLevel::Row,
            "column" => GranularityLevel::Column,
            _ => GranularityLevel::Other(value),
        }
    }
}

impl From<GranularityLevel> for String {
    fn from(value: GranularityLevel) -> Self {
        match value {
            GranularityLevel::Database => "database".to_string(),
            GranularityLevel::Table => "table".to_string(),
            GranularityLevel::Row => "row".to_string(),
            GranularityLevel::Column => "column".to_string(),
            GranularityLevel::Other(name) => name,
        }
    }
}

/// Flat, serde-facing form of a [`Subscription`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SubscriptionRecord {
    client_id: String,
    table_key: String,
    backend: Backend,
    granularity: GranularityLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    column: Option<String>,
}

impl TryFrom<SubscriptionRecord> for Subscription {
    type Error = Error;

    fn try_from(record: SubscriptionRecord) -> Result<Self> {
        let granularity = match (record.granularity, record.column) {
            (GranularityLevel::Other(name), _) => {
                return Err(Error::InvalidSubscription {
                    message: format!(
                        "unrecognized granularity '{}' on '{}'",
                        name, record.table_key
                    ),
                })
            }
            (GranularityLevel::Column, Some(column)) => Granularity::Column(column),
            (GranularityLevel::Column, None) => {
                return Err(Error::InvalidSubscription {
                    message: format!(
                        "column granularity on '{}' requires a column",
                        record.table_key
                    ),
                })
            }
            (level, Some(column)) => {
                return Err(Error::InvalidSubscription {
                    message: format!(
                        "column '{}' given for {:?} granularity on '{}'",
                        column, level, record.table_key
                    ),
                })
            }
            (GranularityLevel::Database, None) => Granularity::Database,
            (GranularityLevel::Table, None) => Granularity::Table,
            (GranularityLevel::Row, None) => Granularity::Row,
        };

        Subscription::new(record.client_id, record.table_key, record.backend, granularity)
    }
}

impl From<Subscription> for SubscriptionRecord {
    fn from(subscription: Subscription) -> Self {
        let (granularity, column) = match subscription.granularity {
            Granularity::Database => (GranularityLevel::Database, None),
            Granularity::Table => (GranularityLevel::Table, None),
            Granularity::Row => (GranularityLevel::Row, None),
            Granularity::Column(column) => (GranularityLevel::Column, Some(column)),
        };

        Self {
            client_id: subscription.client_id,
            table_key: subscription.table_key,
            backend: subscription.backend,
            granularity,
            column,
        }
    }
}

/// Deserializes a list of subscription records for configuration loading.
///
/// A record with an unrecognized granularity is a configuration defect of
/// that subscription alone: it is logged and dropped and the rest of the
/// list still loads. Any other invalid record fails the whole list.
pub fn deserialize_subscriptions<'de, D>(
    deserializer: D,
) -> std::result::Result<Vec<Subscription>, D::Error>
where
    D: Deserializer<'de>,
{
    let records = Vec::<SubscriptionRecord>::deserialize(deserializer)?;
    let mut subscriptions = Vec::with_capacity(records.len());

    for record in records {
        if let GranularityLevel::Other(name) = &record.granularity {
            warn!(
                client_id = %record.client_id,
                table_key = %record.table_key,
                granularity = %name,
                "Unrecognized granularity, subscription dropped"
            );
            continue;
        }
        subscriptions.push(Subscription::try_from(record).map_err(de::Error::custom)?);
    }

    Ok(subscriptions)
}

/// Subscriptions indexed by the key they follow.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionSet {
    by_table: HashMap<String, Vec<Subscription>>,
    by_database: HashMap<String, Vec<Subscription>>,
}

impl SubscriptionSet {
    pub fn new(subscriptions: impl IntoIterator<Item = Subscription>) -> Self {
        let mut set = Self::default();
        for subscription in subscriptions {
            let index = match subscription.granularity {
                Granularity::Database => &mut set.by_database,
                _ => &mut set.by_table,
            };
            let entry = index.entry(subscription.table_key.clone()).or_default();
            if !entry.contains(&subscription) {
                entry.push(subscription);
            }
        }
        set
    }

    /// Subscriptions following the event's source table or its database.
    ///
    /// Table, row and column subscriptions match on `<database>.<table>`,
    /// database subscriptions on the database name alone.
    pub fn for_event(&self, event: &ChangeEvent) -> Vec<&Subscription> {
        let tables = self.by_table.get(&event.table_key()).into_iter().flatten();
        let databases = self.by_database.get(&event.database).into_iter().flatten();
        tables.chain(databases).collect()
    }

    pub fn len(&self) -> usize {
        self.by_table
            .values()
            .chain(self.by_database.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RowChange;
    use serde_json::json;

    #[test]
    fn test_backend_aliases() {
        assert_eq!(Backend::from("redis"), Backend::Redis);
        assert_eq!(Backend::from("RabbitMQ"), Backend::Exchange);
        assert_eq!(Backend::from("kafka"), Backend::Stream);
        assert_eq!(Backend::from("nats"), Backend::Other("nats".to_string()));
        assert_eq!(Backend::Other("nats".to_string()).to_string(), "nats");
    }

    #[test]
    fn test_deserialize_column_subscription() {
        let subscription: Subscription = serde_json::from_value(json!({
            "client_id": "billing",
            "table_key": "shop.orders",
            "backend": "kafka",
            "granularity": "column",
            "column": "status"
        }))
        .unwrap();

        assert_eq!(subscription.client_id(), "billing");
        assert_eq!(subscription.backend(), &Backend::Stream);
        assert_eq!(subscription.granularity().tracked_column(), Some("status"));
    }

    #[test]
    fn test_column_granularity_requires_column() {
        let result: std::result::Result<Subscription, _> = serde_json::from_value(json!({
            "client_id": "billing",
            "table_key": "shop.orders",
            "backend": "redis",
            "granularity": "column"
        }));
        assert!(result.is_err());

        let result = Subscription::column("billing", "shop.orders", Backend::Redis, "");
        assert!(matches!(result, Err(Error::InvalidSubscription { .. })));
    }

    #[test]
    fn test_coarse_granularity_rejects_column() {
        let result: std::result::Result<Subscription, _> = serde_json::from_value(json!({
            "client_id": "billing",
            "table_key": "shop.orders",
            "backend": "redis",
            "granularity": "table",
            "column": "status"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_database_granularity_is_coarse() {
        let subscription: Subscription = serde_json::from_value(json!({
            "client_id": "replica",
            "table_key": "shop",
            "backend": "redis",
            "granularity": "database"
        }))
        .unwrap();

        assert_eq!(subscription.granularity(), &Granularity::Database);
        assert_eq!(subscription.granularity().tracked_column(), None);
    }

    #[test]
    fn test_unknown_granularity_drops_only_that_record() {
        #[derive(Deserialize)]
        struct Records {
            #[serde(deserialize_with = "deserialize_subscriptions")]
            subscriptions: Vec<Subscription>,
        }

        let records: Records = serde_json::from_value(json!({
            "subscriptions": [
                {"client_id": "a", "table_key": "shop.orders", "backend": "redis", "granularity": "table"},
                {"client_id": "b", "table_key": "shop.orders", "backend": "redis", "granularity": "hourly"},
                {"client_id": "c", "table_key": "shop", "backend": "kafka", "granularity": "database"}
            ]
        }))
        .unwrap();

        let clients: Vec<_> = records.subscriptions.iter().map(|s| s.client_id()).collect();
        assert_eq!(clients, vec!["a", "c"]);

        // A single record with an unknown granularity is still an error on its own
        let result: std::result::Result<Subscription, _> = serde_json::from_value(json!({
            "client_id": "b",
            "table_key": "shop.orders",
            "backend": "redis",
            "granularity": "hourly"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_subscription_list_with_missing_column_fails() {
        #[derive(Debug, Deserialize)]
        struct Records {
            #[serde(deserialize_with = "deserialize_subscriptions")]
            #[allow(dead_code)]
            subscriptions: Vec<Subscription>,
        }

        let result: std::result::Result<Records, _> = serde_json::from_value(json!({
            "subscriptions": [
                {"client_id": "a", "table_key": "shop.orders", "backend": "redis", "granularity": "column"}
            ]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_subscription_set_lookup() {
        let set = SubscriptionSet::new(vec![
            Subscription::table("a", "shop.orders", Backend::Redis).unwrap(),
            Subscription::table("a", "shop.orders", Backend::Redis).unwrap(),
            Subscription::column("b", "shop.orders", Backend::Stream, "status").unwrap(),
            Subscription::table("c", "shop.users", Backend::Exchange).unwrap(),
        ]);

        let event = ChangeEvent::new("shop", "orders", RowChange::Insert { rows: vec![] });
        assert_eq!(set.for_event(&event).len(), 2);
        assert_eq!(set.len(), 3);

        let unknown = ChangeEvent::new("shop", "invoices", RowChange::Insert { rows: vec![] });
        assert!(set.for_event(&unknown).is_empty());
    }

    #[test]
    fn test_database_subscription_matches_every_table() {
        let set = SubscriptionSet::new(vec![
            Subscription::table("a", "shop.orders", Backend::Redis).unwrap(),
            Subscription::new("b", "shop", Backend::Stream, Granularity::Database).unwrap(),
        ]);

        let orders = ChangeEvent::new("shop", "orders", RowChange::Insert { rows: vec![] });
        let clients: Vec<_> = set.for_event(&orders).iter().map(|s| s.client_id()).collect();
        assert_eq!(clients, vec!["a", "b"]);

        let users = ChangeEvent::new("shop", "users", RowChange::Insert { rows: vec![] });
        assert_eq!(set.for_event(&users).len(), 1);

        let other = ChangeEvent::new("crm", "users", RowChange::Insert { rows: vec![] });
        assert!(set.for_event(&other).is_empty());
        assert!(!set.is_empty());
    }
}
