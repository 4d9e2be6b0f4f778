//! Row-level change events as produced by the binlog reader.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single row image: column name to captured value.
pub type RowImage = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRow {
    pub before: RowImage,
    pub after: RowImage,
}

/// The rows carried by an event, tagged by the kind of change.
///
/// Binlog events the distributor has no row semantics for (DDL, truncate,
/// ...) deserialize to [`RowChange::Unsupported`] so they can still be
/// forwarded on coarse routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum RowChange {
    Insert { rows: Vec<RowImage> },
    Update { rows: Vec<UpdateRow> },
    Delete { rows: Vec<RowImage> },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub database: String,
    pub table: String,
    #[serde(default)]
    pub ts_ms: i64,
    pub change: RowChange,
}

impl ChangeEvent {
    pub fn new(database: impl Into<String>, table: impl Into<String>, change: RowChange) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            ts_ms: 0,
            change,
        }
    }

    pub fn with_ts_ms(mut self, ts_ms: i64) -> Self {
        self.ts_ms = ts_ms;
        self
    }

    /// Key of the source table, `<database>.<table>`.
    pub fn table_key(&self) -> String {
        format!("{}.{}", self.database, self.table)
    }

    pub fn kind(&self) -> &'static str {
        match self.change {
            RowChange::Insert { .. } => "INSERT",
            RowChange::Update { .. } => "UPDATE",
            RowChange::Delete { .. } => "DELETE",
            RowChange::Unsupported => "UNSUPPORTED",
        }
    }

    pub fn row_count(&self) -> usize {
        match &self.change {
            RowChange::Insert { rows } | RowChange::Delete { rows } => rows.len(),
            RowChange::Update { rows } => rows.len(),
            RowChange::Unsupported => 0,
        }
    }

    /// A new event with this event's header and the given rows.
    pub fn with_change(&self, change: RowChange) -> Self {
        Self {
            database: self.database.clone(),
            table: self.table.clone(),
            ts_ms: self.ts_ms,
            change,
        }
    }

    pub fn single_insert(&self, row: RowImage) -> Self {
        self.with_change(RowChange::Insert { rows: vec![row] })
    }

    pub fn single_delete(&self, row: RowImage) -> Self {
        self.with_change(RowChange::Delete { rows: vec![row] })
    }

    pub fn single_update(&self, row: UpdateRow) -> Self {
        self.with_change(RowChange::Update { rows: vec![row] })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_update_event() {
        let event: ChangeEvent = serde_json::from_value(json!({
            "database": "shop",
            "table": "orders",
            "ts_ms": 1697369400000i64,
            "change": {
                "type": "UPDATE",
                "rows": [{
                    "before": {"id": 5, "status": "open"},
                    "after": {"id": 5, "status": "closed"}
                }]
            }
        }))
        .unwrap();

        assert_eq!(event.kind(), "UPDATE");
        assert_eq!(event.row_count(), 1);
        assert_eq!(event.table_key(), "shop.orders");
        match event.change {
            RowChange::Update { rows } => {
                assert_eq!(rows[0].before["status"], "open");
                assert_eq!(rows[0].after["status"], "closed");
            }
            other => panic!("unexpected change: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_unsupported() {
        let event: ChangeEvent = serde_json::from_value(json!({
            "database": "shop",
            "table": "orders",
            "change": {"type": "TRUNCATE"}
        }))
        .unwrap();

        assert_eq!(event.change, RowChange::Unsupported);
        assert_eq!(event.ts_ms, 0);
        assert_eq!(event.row_count(), 0);
    }

    #[test]
    fn test_single_row_keeps_header() {
        let event = ChangeEvent::new("shop", "orders", RowChange::Insert { rows: vec![] })
            .with_ts_ms(42);
        let row = json!({"id": 1}).as_object().cloned().unwrap();

        let single = event.single_delete(row.clone());
        assert_eq!(single.database, "shop");
        assert_eq!(single.table, "orders");
        assert_eq!(single.ts_ms, 42);
        assert_eq!(single.change, RowChange::Delete { rows: vec![row] });
    }

    #[test]
    fn test_serialized_tag_is_uppercase() {
        let event = ChangeEvent::new("shop", "orders", RowChange::Delete { rows: vec![] });
        let encoded = serde_json::to_string(&event).unwrap();
        assert!(encoded.contains("\"type\":\"DELETE\""));
    }
}
